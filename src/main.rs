use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vault_convert::backend::EntryEncoding;
use vault_convert::cli::{
    list_keys, load_value, read_value, write_value, ListOptions, ReadOptions, WriteOptions,
};
use vault_convert::compress::Compression;
use vault_convert::convert::{array_to_tree, tree_to_array, ConvertOptions, DEFAULT_KEY_PREFIX};

/// Version info from build.rs
const VERSION: &str = env!("VAULT_CONVERT_VERSION");
const PROFILE: &str = env!("VAULT_CONVERT_PROFILE");
const GIT_HASH: &str = env!("VAULT_CONVERT_GIT_HASH");

fn get_version() -> &'static str {
    use std::sync::OnceLock;
    static VERSION_STRING: OnceLock<String> = OnceLock::new();
    VERSION_STRING.get_or_init(|| format!("{} {} ({})", PROFILE, VERSION, GIT_HASH))
}

#[derive(Parser)]
#[command(name = "vault-convert")]
#[command(
    author,
    about = "Convert secret store data between a Consul KV export and a filesystem storage tree",
    long_about = None
)]
struct Cli {
    /// Print version
    #[arg(short = 'V', long)]
    version: bool,

    /// Log progress to standard error (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a filesystem storage tree into a JSON KV export
    #[command(alias = "t2a")]
    ToArray {
        /// Key prefix the records live under in Consul
        #[arg(long, alias = "consul-path", default_value = DEFAULT_KEY_PREFIX)]
        key_prefix: String,

        /// Leaf file encoding of the tree
        #[arg(long, default_value = "raw", value_parser = parse_encoding)]
        encoding: EntryEncoding,

        /// Existing directory holding the tree
        input: PathBuf,

        /// Output JSON file (replaced if it exists)
        output: PathBuf,
    },

    /// Convert a JSON KV export into a filesystem storage tree
    #[command(alias = "a2t")]
    ToTree {
        /// Key prefix the records live under in Consul
        #[arg(long, alias = "consul-path", default_value = DEFAULT_KEY_PREFIX)]
        key_prefix: String,

        /// Leaf file encoding of the tree
        #[arg(long, default_value = "raw", value_parser = parse_encoding)]
        encoding: EntryEncoding,

        /// JSON export to read
        input: PathBuf,

        /// Output directory (created if it does not exist)
        output: PathBuf,
    },

    /// List keys under a prefix of a tree
    #[command(alias = "ls")]
    List {
        /// Leaf file encoding of the tree
        #[arg(long, default_value = "raw", value_parser = parse_encoding)]
        encoding: EntryEncoding,

        /// Tree root directory
        tree: PathBuf,

        /// Key prefix to list
        #[arg(default_value = "")]
        prefix: String,
    },

    /// Read one value from a tree as a hex dump
    Read {
        /// Leaf file encoding of the tree
        #[arg(long, default_value = "raw", value_parser = parse_encoding)]
        encoding: EntryEncoding,

        /// Write the value byte-for-byte instead of a hex dump
        #[arg(long)]
        verbatim: bool,

        /// Print the value as stored, without undoing compression
        #[arg(long)]
        no_decompress: bool,

        /// Tree root directory
        tree: PathBuf,

        /// Key to read
        key: String,
    },

    /// Write one value into a tree, read from standard input by default
    Write {
        /// Leaf file encoding of the tree
        #[arg(long, default_value = "raw", value_parser = parse_encoding)]
        encoding: EntryEncoding,

        /// Value to write instead of standard input; `@FILE` writes the file's content
        #[arg(long)]
        data: Option<String>,

        /// Compress the value before writing (gzip unless `--compress=lz4`)
        #[arg(
            long,
            num_args = 0..=1,
            require_equals = true,
            default_missing_value = "gzip",
            value_parser = parse_compression
        )]
        compress: Option<Compression>,

        /// Tree root directory
        tree: PathBuf,

        /// Key to write
        key: String,
    },
}

fn parse_encoding(s: &str) -> Result<EntryEncoding, String> {
    s.parse().map_err(|e| format!("{}", e))
}

fn parse_compression(s: &str) -> Result<Compression, String> {
    s.parse().map_err(|e| format!("{}", e))
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "vault_convert=warn",
        1 => "vault_convert=info",
        _ => "vault_convert=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn write_stdout(data: &[u8]) -> vault_convert::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(data)?;
    stdout.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Handle --version flag
    if cli.version {
        println!("vault-convert {}", get_version());
        return ExitCode::SUCCESS;
    }

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            use clap::CommandFactory;
            let _ = Cli::command().print_help();
            println!();
            return ExitCode::SUCCESS;
        }
    };

    init_logging(cli.verbose);

    let result = match command {
        Commands::ToArray {
            key_prefix,
            encoding,
            input,
            output,
        } => {
            let options = ConvertOptions {
                key_prefix,
                encoding,
            };
            tree_to_array(&input, &output, &options).map(|_| ())
        }

        Commands::ToTree {
            key_prefix,
            encoding,
            input,
            output,
        } => {
            let options = ConvertOptions {
                key_prefix,
                encoding,
            };
            array_to_tree(&input, &output, &options).map(|_| ())
        }

        Commands::List {
            encoding,
            tree,
            prefix,
        } => {
            let options = ListOptions { encoding };
            list_keys(&tree, &prefix, &options).and_then(|keys| write_stdout(keys.as_bytes()))
        }

        Commands::Read {
            encoding,
            verbatim,
            no_decompress,
            tree,
            key,
        } => {
            let options = ReadOptions {
                encoding,
                decompress: !no_decompress,
                verbatim,
            };
            read_value(&tree, &key, &options).and_then(|value| write_stdout(&value))
        }

        Commands::Write {
            encoding,
            data,
            compress,
            tree,
            key,
        } => {
            let options = WriteOptions { encoding, compress };
            load_value(data.as_deref(), std::io::stdin().lock())
                .and_then(|value| write_value(&tree, &key, value, &options))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
