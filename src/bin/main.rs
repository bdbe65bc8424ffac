use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Dead children from spawned commands are reaped by the kernel.
    unsafe {
        libc::signal(libc::SIGCHLD, libc::SIG_IGN);
    }

    let args: Vec<String> = std::env::args().collect();
    let mut custom_config_path: Option<PathBuf> = None;

    match args.get(1).map(|s| s.as_str()) {
        Some("--version") => {
            println!("tagwm {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some("--help") => {
            print_help();
            return Ok(());
        }
        Some("--init") => {
            init_config()?;
            return Ok(());
        }
        Some("--config") => {
            if let Some(path) = args.get(2) {
                custom_config_path = Some(PathBuf::from(path));
            } else {
                eprintln!("Error: --config requires a path argument");
                std::process::exit(1);
            }
        }
        Some(other) => {
            eprintln!("Error: unknown option {}", other);
            print_help();
            std::process::exit(1);
        }
        None => {}
    }

    let config = load_config(custom_config_path)?;

    let mut wm = tagwm::window_manager::WindowManager::new(config)?;
    wm.scan()?;
    let should_restart = wm.run()?;
    wm.cleanup()?;

    drop(wm);

    if should_restart {
        use std::os::unix::process::CommandExt;
        let err = std::process::Command::new(&args[0]).args(&args[1..]).exec();
        eprintln!("Failed to restart: {}", err);
    }

    Ok(())
}

fn load_config(custom_path: Option<PathBuf>) -> Result<tagwm::Config> {
    let config_path = match custom_path {
        Some(path) => path,
        None => {
            let path = config_dir().join("config.ron");
            if !path.exists() {
                return Ok(tagwm::Config::default());
            }
            path
        }
    };

    let config_str = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file {:?}", config_path))?;
    tagwm::config::parse_config(&config_str)
        .with_context(|| format!("Failed to parse config {:?}", config_path))
}

fn init_config() -> Result<()> {
    let config_dir = config_dir();
    std::fs::create_dir_all(&config_dir)?;

    let config_path = config_dir.join("config.ron");
    std::fs::write(&config_path, include_str!("../../templates/config.ron"))?;

    println!("Config created at {:?}", config_path);
    println!("Edit the file and restart with Mod+Shift+R");
    Ok(())
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .expect("could not determine the config directory")
        .join("tagwm")
}

fn print_help() {
    println!("tagwm - a dynamic tiling window manager\n");
    println!("USAGE:");
    println!("    tagwm [OPTIONS]\n");
    println!("OPTIONS:");
    println!("    --init              Create a default config in ~/.config/tagwm/config.ron");
    println!("    --config <PATH>     Use a custom config file");
    println!("    --version           Print version information");
    println!("    --help              Print this help message\n");
    println!("CONFIG:");
    println!("    Location: ~/.config/tagwm/config.ron");
    println!("    Every field is optional; missing fields keep built-in defaults");
}
