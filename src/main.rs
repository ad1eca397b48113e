use std::io::stdout;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, ValueHint, value_parser};
use clap_complete::aot::{Shell, generate};

use piidigger::config::Config;
use piidigger::console;
use piidigger::detect;
use piidigger::error::{ConfigError, exit_code};
use piidigger::manager::StopFlag;
use piidigger::registry::registry;

/// Search the file system for Personally Identifiable Information.
///
/// All program configuration is kept in 'piidigger.toml', a TOML-formatted
/// configuration file. A built-in default is used when the file does not
/// exist.
#[derive(Parser)]
#[command(version)]
pub struct Args {
    #[arg(
        short = 'f',
        long = "conf-file",
        default_value = "piidigger.toml",
        value_hint = ValueHint::FilePath,
        help = "path/to/configfile.toml configuration file. If the file is not found, the default, internal configuration will be used."
    )]
    conf_file: PathBuf,

    #[arg(
        short = 'd',
        long = "default-conf",
        help = "Use the default, internal config"
    )]
    default_conf: bool,

    #[arg(
        short = 'c',
        long = "create-conf",
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        help = "Create a default configuration file for editing/reuse"
    )]
    create_conf: Option<PathBuf>,

    #[arg(
        short = 'p',
        long = "max-process",
        value_name = "N",
        help = "Override the number of workers used for scanning file contents. Uses the lesser of the CPU count or this value."
    )]
    max_process: Option<usize>,

    #[arg(
        long = "cpu-count",
        help = "Show the number of logical CPUs provided by the OS. Use this to tune --max-process."
    )]
    cpu_count: bool,

    #[arg(long = "list-datahandlers", help = "Display the list of data handlers and exit")]
    list_datahandlers: bool,

    #[arg(long = "list-filetypes", help = "Display the list of file types and exit")]
    list_filetypes: bool,

    #[arg(
        long = "generate",
        value_parser = value_parser!(Shell),
        help = "Generate shell completions"
    )]
    generate: Option<Shell>,
}

fn main() -> ExitCode {
    ExitCode::from(u8::try_from(run()).unwrap_or(1))
}

fn run() -> i32 {
    let args = Args::parse();

    if let Some(generator) = args.generate {
        let mut cmd = Args::command();
        let name = cmd.get_name().to_owned();
        generate(generator, &mut cmd, name, &mut stdout());
        return exit_code::OK;
    }

    if args.cpu_count {
        println!("CPU cores: {}", num_cpus::get());
        return exit_code::OK;
    }

    if args.list_datahandlers {
        println!("Data handler modules: {:?}", detect::supported_names());
        return exit_code::OK;
    }

    if args.list_filetypes {
        println!("File extns: {:?}", registry().supported_exts());
        println!("MIME types: {:?}", registry().supported_mimes());
        return exit_code::OK;
    }

    if let Some(path) = args.create_conf {
        let path = if path.extension().is_some_and(|e| e == "toml") {
            path
        } else {
            PathBuf::from(format!("{}.toml", path.display()))
        };
        return match Config::write_default(&path) {
            Ok(()) => {
                console::normal(&format!(
                    "Default configuration written to {}",
                    path.display()
                ));
                exit_code::OK
            }
            Err(e) => {
                console::error(&format!("Config file not written: {e}"));
                exit_code::UNKNOWN
            }
        };
    }

    let config = if args.default_conf {
        console::normal("Using default configuration.");
        Config::default_config()
    } else {
        Config::load(&args.conf_file)
    };
    let mut config = match config {
        Ok(config) => config,
        Err(e @ (ConfigError::Parse { .. } | ConfigError::MissingStartDir(_))) => {
            console::error(&e.to_string());
            return exit_code::INVALID_CONFIG;
        }
        Err(e) => {
            console::error(&e.to_string());
            return exit_code::UNKNOWN;
        }
    };

    if let Some(requested) = args.max_process {
        if requested > 0 {
            config.set_max_procs(requested.min(num_cpus::get()));
        }
    }

    let stop = StopFlag::new();
    {
        let stop = stop.clone();
        let result = ctrlc::set_handler(move || {
            console::normal("");
            console::warn("User terminated scan. Shutting down.");
            stop.set();
        });
        if let Err(e) = result {
            console::warn(&format!("Could not install interrupt handler: {e}"));
        }
    }

    match piidigger::pipeline::run(config, stop) {
        Ok(summary) => {
            console::normal("Scan complete.");
            console::normal(&format!(
                "Scanned {} files in {} folders; {} results.",
                summary.counters.files_scanned,
                summary.counters.dirs_scanned,
                summary.counters.total_results,
            ));
            exit_code::OK
        }
        Err(e) => {
            console::error(&e.to_string());
            exit_code::UNKNOWN
        }
    }
}
