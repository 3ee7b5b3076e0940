// emu-host - Main Entry Point
//
// `run` opens a window and plays a ROM on a wasm core; `validate` checks a
// ROM image without loading any core.

use clap::{Parser, Subcommand};
use emu_host::audio::{AudioOutput, NullAudioOutput};
use emu_host::cartridge::{ines::INesHeader, validate_rom};
use emu_host::console::Console;
use emu_host::core::{ExportNames, WasmCoreLoader};
use emu_host::display::{run_host_window, WindowConfig};
use emu_host::emulator::{EmulatorHost, HostConfig, CONFIG_FILE};
use emu_host::input::{GamepadHub, InputConfig};
use emu_host::logger::Logger;
use emu_host::persistence::{BackgroundStorage, FileStorage, PersistenceConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "emu-host")]
#[command(about = "Host runtime for sandboxed emulation cores", long_about = None)]
#[command(version)]
struct Cli {
    /// Host configuration file
    #[arg(long, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a ROM in a window
    Run {
        /// ROM image
        rom: PathBuf,

        /// Console (nes, chip8); guessed from the file extension by default
        #[arg(long)]
        console: Option<Console>,

        /// Core module (.wasm or .wat); defaults to the configured core
        #[arg(long)]
        core: Option<PathBuf>,

        /// TOML file overriding the core's export names
        #[arg(long)]
        exports: Option<PathBuf>,

        /// Start from this save file instead of stored saves
        #[arg(long)]
        save: Option<PathBuf>,

        /// Storage key; defaults to the ROM file name
        #[arg(long)]
        game_id: Option<String>,

        /// Save slot for auto-saves
        #[arg(long)]
        slot: Option<u32>,

        /// Store a thumbnail after the capture delay
        #[arg(long)]
        capture: bool,

        /// Disable audio
        #[arg(long)]
        no_audio: bool,

        /// Input configuration file
        #[arg(long, default_value = "input_config.toml")]
        input: PathBuf,
    },

    /// Check a ROM image
    Validate {
        /// ROM image
        rom: PathBuf,

        /// Console (nes, chip8); guessed from the file extension by default
        #[arg(long)]
        console: Option<Console>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { rom, console } => validate(&rom, console),
        Commands::Run {
            rom,
            console,
            core,
            exports,
            save,
            game_id,
            slot,
            capture,
            no_audio,
            input,
        } => {
            let options = RunOptions {
                rom,
                console,
                core,
                exports,
                save,
                game_id,
                slot,
                capture,
                no_audio,
                input,
            };
            run(&cli.config, options)
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

struct RunOptions {
    rom: PathBuf,
    console: Option<Console>,
    core: Option<PathBuf>,
    exports: Option<PathBuf>,
    save: Option<PathBuf>,
    game_id: Option<String>,
    slot: Option<u32>,
    capture: bool,
    no_audio: bool,
    input: PathBuf,
}

fn resolve_console(rom: &Path, console: Option<Console>) -> Result<Console, String> {
    console
        .or_else(|| Console::from_path(rom))
        .ok_or_else(|| format!("Cannot tell the console of {}; pass --console", rom.display()))
}

fn validate(rom: &Path, console: Option<Console>) -> Result<(), Box<dyn std::error::Error>> {
    let console = resolve_console(rom, console)?;
    let bytes = fs::read(rom)?;

    println!("ROM: {} ({} bytes)", rom.display(), bytes.len());
    println!("Console: {}", console);

    if console == Console::Nes {
        if let Ok(header) = INesHeader::parse(&bytes) {
            println!("  Mapper: {}", header.mapper);
            println!("  PRG banks: {}", header.prg_banks);
            println!("  CHR banks: {}", header.chr_banks);
            println!("  Trainer: {}", header.has_trainer);
            println!("  Battery: {}", header.has_battery);
        }
    }

    let info = validate_rom(console, &bytes).map_err(|e| e.reason())?;
    println!("  Save size: {} bytes", info.save_size);
    println!("OK");
    Ok(())
}

fn build_logger(config: &HostConfig) -> Logger {
    let mut logger = Logger::new();
    logger.set_log_level(config.logging.level);
    logger.set_echo_stderr(config.logging.stderr);
    if let Some(path) = &config.logging.file {
        if let Err(e) = logger.open_log_file(path) {
            eprintln!("Warning: Could not open log file {}: {}", path.display(), e);
        }
    }
    logger
}

fn open_audio(config: &HostConfig, disabled: bool, logger: &mut Logger) -> Box<dyn AudioOutput> {
    if disabled || !config.audio.enabled {
        logger.info("Audio disabled");
        return Box::new(NullAudioOutput);
    }

    #[cfg(feature = "audio")]
    {
        let max_queue_ms = u32::try_from(config.audio.max_queue_ms).unwrap_or(u32::MAX);
        match emu_host::audio::CpalAudioOutput::new(config.audio.sample_rate, max_queue_ms) {
            Ok(output) => return Box::new(output),
            Err(e) => logger.warn(format!("Audio unavailable: {}", e)),
        }
    }

    Box::new(NullAudioOutput)
}

fn run(config_path: &Path, options: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = HostConfig::load_or_default(config_path);
    let mut logger = build_logger(&config);

    let console = resolve_console(&options.rom, options.console)?;
    let rom = fs::read(&options.rom)?;
    let game_id = options.game_id.clone().unwrap_or_else(|| {
        options
            .rom
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "default".to_string())
    });

    let storage = FileStorage::new(&config.persistence.storage_directory);
    let slot = match storage.select_slot(&game_id, options.slot, config.persistence.save_slot) {
        Ok(slot) => slot,
        Err(e) => {
            logger.warn(format!("Could not read save metadata for {}: {}", game_id, e));
            options.slot.or(config.persistence.save_slot)
        }
    };
    let save = match (&options.save, slot) {
        (Some(path), _) => Some(fs::read(path)?),
        (None, Some(slot)) => match storage.read_slot(&game_id, slot) {
            Ok(save) => save,
            Err(e) => {
                logger.warn(format!("Could not read stored save for {}: {}", game_id, e));
                None
            }
        },
        (None, None) => None,
    };

    let core_path = options
        .core
        .clone()
        .unwrap_or_else(|| config.cores.path_for(console).to_path_buf());
    let mut loader = WasmCoreLoader::new(&core_path);
    if let Some(path) = &options.exports {
        let names: ExportNames = toml::from_str(&fs::read_to_string(path)?)?;
        loader = loader.with_exports(names);
    }
    logger.info(format!("Core module: {}", core_path.display()));

    let input_config = InputConfig::load_or_default(&options.input);
    let audio = open_audio(&config, options.no_audio, &mut logger);

    let persistence = PersistenceConfig {
        game_id: game_id.clone(),
        slot,
        autosave_interval: config.persistence.autosave_interval(),
        capture_delay: config.persistence.capture_delay(),
        capture_enabled: options.capture || config.persistence.capture_image,
    };

    let host = EmulatorHost::builder(console, rom)
        .apply_config(&config)
        .with_persistence(persistence)
        .with_save(save)
        .with_input_config(&input_config)?
        .with_audio(audio)
        .with_storage(Box::new(BackgroundStorage::spawn(Box::new(storage))))
        .with_logger(logger)
        .construct(loader)
        .map_err(|e| e.reason())?;

    let window = WindowConfig::new()
        .with_scale(config.video.scale)
        .with_vsync(config.video.vsync)
        .with_title(format!("emu-host - {}", game_id));

    run_host_window(window, host, GamepadHub::new())?;
    println!("Session closed.");
    Ok(())
}
