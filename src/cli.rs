//! Minimal CLI: declarations → (hydrate | schema)
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use json_loader::{LoadOptions, Loader, TypeRegistry};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// hydrate JSON documents into declared types, or print the declared schemas
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    /// more log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// hydrate each input and print the resulting object graph
    Hydrate(HydrateOut),
    /// print the extracted schema of declared types
    Schema(SchemaOut),
}

#[derive(Args, Debug, Clone)]
struct TypeSettings {
    /// declarations file: `@type Name` sections of `@property` lines
    #[arg(long, short = 't')]
    types: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required_unless_present = "json", conflicts_with = "json")]
    input: Vec<String>,

    /// a raw JSON document instead of input files
    #[arg(long)]
    json: Option<String>,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// deepest allowed nesting of constructed instances
    #[arg(long)]
    max_depth: Option<usize>,

    /// JSON file with loader options; flags above take precedence
    #[arg(long)]
    options: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct HydrateOut {
    #[command(flatten)]
    type_settings: TypeSettings,

    #[command(flatten)]
    input_settings: InputSettings,

    /// root type of every document
    #[arg(long)]
    root: String,

    /// tag every instance with its type under "$type"
    #[arg(long, default_value_t = false)]
    type_tags: bool,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct SchemaOut {
    #[command(flatten)]
    type_settings: TypeSettings,

    /// only these types (all declared types if omitted)
    #[arg(long = "type")]
    type_names: Vec<String>,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl TypeSettings {
    fn load(&self) -> Result<TypeRegistry> {
        let text = std::fs::read_to_string(&self.types)
            .with_context(|| format!("failed to read declarations {}", self.types.display()))?;
        let types = TypeRegistry::parse_declarations(&text);
        if types.is_empty() {
            bail!("no `@type` sections in {}", self.types.display());
        }
        tracing::info!(types = types.len(), "loaded declarations");
        Ok(types)
    }
}

impl InputSettings {
    fn load_options(&self) -> Result<LoadOptions> {
        let mut options = match self.options.as_ref() {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read options {}", path.display()))?;
                serde_json::from_str::<LoadOptions>(&text)
                    .with_context(|| format!("invalid options file {}", path.display()))?
            }
            None => LoadOptions::default(),
        };
        if let Some(pointer) = self.json_pointer.as_ref() {
            options.json_pointer = Some(pointer.clone());
        }
        if let Some(max_depth) = self.max_depth {
            options.max_depth = max_depth;
        }
        Ok(options)
    }

    fn load_process(
        &self,
        loader: &mut Loader,
        root: &str,
        mut apply: impl FnMut(serde_json::Value) -> Result<()>,
        type_tags: bool,
    ) -> Result<()> {
        if let Some(json) = self.json.as_ref() {
            let graph = loader.load_str(root, json).context("failed to hydrate --json")?;
            return apply(graph.to_json(type_tags));
        }
        let source_paths = resolve_file_path_patterns(&self.input)
            .context("failed to resolve input file paths")?;
        for source_path in source_paths {
            let graph = loader
                .load_file(root, &source_path)
                .with_context(|| format!("failed to hydrate {}", source_path.display()))?;
            apply(graph.to_json(type_tags))?;
        }
        Ok(())
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Hydrate(target) => {
                let types = target.type_settings.load()?;
                let options = target.input_settings.load_options()?;
                let mut loader = Loader::new(types).with_options(options);

                let mut documents = Vec::new();
                target.input_settings.load_process(
                    &mut loader,
                    &target.root,
                    |value| {
                        documents.push(value);
                        Ok(())
                    },
                    target.type_tags,
                )?;
                let output = match documents.len() {
                    1 => documents.remove(0),
                    _ => serde_json::Value::Array(documents),
                };
                write_output(target.out.as_deref(), &serde_json::to_string_pretty(&output)?)
            }
            Command::Schema(target) => {
                let types = target.type_settings.load()?;
                let names = if target.type_names.is_empty() {
                    types.names().map(str::to_string).collect::<Vec<_>>()
                } else {
                    target.type_names.clone()
                };
                let mut loader = Loader::new(types);
                let mut schemas = Vec::with_capacity(names.len());
                for name in &names {
                    schemas.push(loader.schema(name)?.to_json());
                }
                let output = serde_json::Value::Array(schemas);
                write_output(target.out.as_deref(), &serde_json::to_string_pretty(&output)?)
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_output(out: Option<&Path>, text: &str) -> Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, text).with_context(|| format!("failed to write {}", out.display()))
        }
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_paths_pass_through() {
        let paths = resolve_file_path_patterns(["a.json", "dir/b.json"]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("a.json"), PathBuf::from("dir/b.json")]);
    }

    #[test]
    fn unmatched_glob_is_an_error() {
        assert!(resolve_file_path_patterns(["/definitely/not/here/*.json"]).is_err());
    }

    #[test]
    fn hydrate_arguments_parse() {
        let cli = CommandLineInterface::try_parse_from([
            "json-loader", "hydrate", "-t", "types.decl", "--root", "Widget",
            "--json", "{}", "--max-depth", "4",
        ])
        .unwrap();
        let Command::Hydrate(target) = cli.cmd else { panic!("expected hydrate") };
        assert_eq!(target.root, "Widget");
        assert_eq!(target.input_settings.load_options().unwrap().max_depth, 4);
    }
}
