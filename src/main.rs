use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use formats::{ClientFeatures, ThingCategory, Version, VersionRegistry};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use thingforge_lib::settings::{ClientInfo, Settings};
use thingforge_lib::{
    ClientMerger, MergeSource, Progress, SpriteOptimizer, SpriteStorage, ThingTypeStorage,
};

/// Inspect, convert and merge client metadata and sprite files
#[derive(Parser)]
#[command(name = "thingforge")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, flags and counts of a client
    Info(ClientArgs),

    /// Compile a client to another version or set of flags
    Convert {
        #[command(flatten)]
        client: ClientArgs,
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Fold duplicate sprites and drop unused ones
    Optimize {
        #[command(flatten)]
        client: ClientArgs,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Append the things and sprites of another client
    Merge {
        #[command(flatten)]
        client: ClientArgs,
        /// Metadata file of the client to merge in
        #[arg(long)]
        source_dat: PathBuf,
        /// Sprite file of the client to merge in
        #[arg(long)]
        source_spr: PathBuf,
        /// Version of the client to merge in (detected when omitted)
        #[arg(long)]
        source_version: Option<u32>,
        /// Optimize the incoming client first (defaults to the settings)
        #[arg(long)]
        optimize: Option<bool>,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Create an empty client
    New {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args)]
struct ClientArgs {
    /// Metadata file (.dat)
    dat: PathBuf,
    /// Sprite file (.spr)
    spr: PathBuf,
    /// Client version, e.g. 860 (detected from the signatures when omitted)
    #[arg(long)]
    version: Option<u32>,
}

#[derive(Args)]
struct OutputArgs {
    /// Metadata output (defaults to overwriting the input)
    #[arg(long)]
    out_dat: Option<PathBuf>,
    /// Sprite output (defaults to overwriting the input)
    #[arg(long)]
    out_spr: Option<PathBuf>,
}

#[derive(Args)]
struct TargetArgs {
    /// Target client version
    #[arg(long)]
    to: u32,
    #[arg(long)]
    out_dat: PathBuf,
    #[arg(long)]
    out_spr: PathBuf,
    #[arg(long)]
    extended: Option<bool>,
    #[arg(long)]
    transparency: Option<bool>,
    #[arg(long)]
    frame_durations: Option<bool>,
    #[arg(long)]
    frame_groups: Option<bool>,
}

impl TargetArgs {
    fn features(&self) -> ClientFeatures {
        let defaults = ClientFeatures::for_version(self.to);
        ClientFeatures::new(
            self.extended.unwrap_or(defaults.extended),
            self.transparency.unwrap_or(defaults.transparency),
            self.frame_durations.unwrap_or(defaults.frame_durations),
            self.frame_groups.unwrap_or(defaults.frame_groups),
        )
    }
}

struct Client {
    things: ThingTypeStorage,
    sprites: SpriteStorage,
    version: Version,
    features: ClientFeatures,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .try_init()
        .ok();

    let cli = Cli::parse();
    let settings = Settings::load();
    let registry = settings.registry();

    match cli.command {
        Commands::Info(args) => info(&settings, &registry, &args),
        Commands::Convert { client, target } => convert(&settings, &registry, &client, &target),
        Commands::Optimize { client, output } => optimize(&settings, &registry, &client, &output),
        Commands::Merge {
            client,
            source_dat,
            source_spr,
            source_version,
            optimize,
            output,
        } => {
            let version = resolve_version(&registry, &source_dat, &source_spr, source_version)?;
            let features = ClientInfo::resolve_features(&source_dat, version.value)?;
            let source = MergeSource {
                metadata: source_dat,
                sprites: source_spr,
                version,
                features,
            };
            let optimize = optimize.unwrap_or(settings.optimize_before_merge);
            merge(&settings, &registry, &client, &source, optimize, &output)
        }
        Commands::New { target } => new_client(&settings, &registry, &target),
    }
}

fn progress_bar() -> Result<ProgressBar> {
    let bar = ProgressBar::new(0);
    bar.set_style(ProgressStyle::with_template(
        "{spinner} {msg:>10} [{bar:40}] {pos}/{len}",
    )?);
    Ok(bar)
}

fn report_to(bar: &ProgressBar) -> impl Fn(Progress) + '_ {
    move |progress: Progress| {
        bar.set_length(progress.total as u64);
        bar.set_position(progress.current as u64);
        if let Some(label) = progress.label {
            bar.set_message(label);
        }
    }
}

/// Signature of a metadata or sprite file.
fn read_signature(path: &Path) -> Result<u32> {
    let mut bytes = [0u8; 4];
    File::open(path)
        .and_then(|mut file| file.read_exact(&mut bytes))
        .with_context(|| format!("failed to read signature of {}", path.display()))?;
    Ok(u32::from_le_bytes(bytes))
}

fn resolve_version(
    registry: &VersionRegistry,
    dat: &Path,
    spr: &Path,
    value: Option<u32>,
) -> Result<Version> {
    match value {
        Some(value) => Ok(registry.require(value)?.clone()),
        None => registry
            .by_signatures(read_signature(dat)?, read_signature(spr)?)
            .cloned()
            .ok_or_else(|| anyhow!("no known client matches the signatures of {}", dat.display())),
    }
}

fn load_client(
    settings: &Settings,
    registry: &VersionRegistry,
    args: &ClientArgs,
) -> Result<Client> {
    let version = resolve_version(registry, &args.dat, &args.spr, args.version)?;
    let features = ClientInfo::resolve_features(&args.dat, version.value)?;

    let bar = progress_bar()?;
    let report = report_to(&bar);
    let mut things = ThingTypeStorage::new(settings.durations);
    things
        .load(&args.dat, &version, features, &report)
        .with_context(|| format!("failed to load {}", args.dat.display()))?;
    let mut sprites = SpriteStorage::new();
    sprites
        .load(&args.spr, &version, features, &report)
        .with_context(|| format!("failed to load {}", args.spr.display()))?;
    bar.finish_and_clear();

    Ok(Client {
        things,
        sprites,
        version,
        features,
    })
}

fn compile(
    things: &mut ThingTypeStorage,
    sprites: &mut SpriteStorage,
    dat: &Path,
    spr: &Path,
    version: &Version,
    features: ClientFeatures,
) -> Result<()> {
    let bar = progress_bar()?;
    let report = report_to(&bar);
    things
        .compile(dat, version, features, &report)
        .with_context(|| format!("failed to compile {}", dat.display()))?;
    sprites
        .compile(spr, version, features, &report)
        .with_context(|| format!("failed to compile {}", spr.display()))?;
    bar.finish_and_clear();

    let mut info = ClientInfo::from_features(features);
    info.metadata_file = dat.file_name().map(|name| name.to_string_lossy().into_owned());
    info.sprites_file = spr.file_name().map(|name| name.to_string_lossy().into_owned());
    info.save(&ClientInfo::sidecar_path(dat))?;
    println!("Compiled {} to {} and {}", version, dat.display(), spr.display());
    Ok(())
}

fn info(settings: &Settings, registry: &VersionRegistry, args: &ClientArgs) -> Result<()> {
    let client = load_client(settings, registry, args)?;
    println!("Client {} ({})", client.version, client.version.value);
    println!("  extended:        {}", client.features.extended);
    println!("  transparency:    {}", client.features.transparency);
    println!("  frame durations: {}", client.features.frame_durations);
    println!("  frame groups:    {}", client.features.frame_groups);
    for category in ThingCategory::ALL {
        println!("  {:<8} {}", format!("{category}s:"), client.things.count(category));
    }
    println!("  sprites: {}", client.sprites.count());
    Ok(())
}

fn convert(
    settings: &Settings,
    registry: &VersionRegistry,
    args: &ClientArgs,
    target: &TargetArgs,
) -> Result<()> {
    let version = registry.require(target.to)?.clone();
    let mut client = load_client(settings, registry, args)?;
    compile(
        &mut client.things,
        &mut client.sprites,
        &target.out_dat,
        &target.out_spr,
        &version,
        target.features(),
    )
}

fn optimize(
    settings: &Settings,
    registry: &VersionRegistry,
    args: &ClientArgs,
    output: &OutputArgs,
) -> Result<()> {
    let mut client = load_client(settings, registry, args)?;
    let bar = progress_bar()?;
    let report =
        SpriteOptimizer::new(&mut client.things, &mut client.sprites).run(&report_to(&bar))?;
    bar.finish_and_clear();
    println!(
        "{} duplicate sprites, {} removed, {} -> {}",
        report.duplicates, report.removed, report.old_count, report.new_count
    );
    if !client.things.is_changed() && !client.sprites.is_changed() {
        return Ok(());
    }

    compile(
        &mut client.things,
        &mut client.sprites,
        output.out_dat.as_deref().unwrap_or(&args.dat),
        output.out_spr.as_deref().unwrap_or(&args.spr),
        &client.version,
        client.features,
    )
}

fn merge(
    settings: &Settings,
    registry: &VersionRegistry,
    args: &ClientArgs,
    source: &MergeSource,
    optimize: bool,
    output: &OutputArgs,
) -> Result<()> {
    let mut client = load_client(settings, registry, args)?;
    let bar = progress_bar()?;
    let report = ClientMerger::new(&mut client.things, &mut client.sprites)
        .optimize(optimize)
        .merge(source, &report_to(&bar))?;
    bar.finish_and_clear();
    println!(
        "Merged {} sprites and {} things",
        report.sprites_added,
        report.things_added.iter().sum::<u32>()
    );

    compile(
        &mut client.things,
        &mut client.sprites,
        output.out_dat.as_deref().unwrap_or(&args.dat),
        output.out_spr.as_deref().unwrap_or(&args.spr),
        &client.version,
        client.features,
    )
}

fn new_client(settings: &Settings, registry: &VersionRegistry, target: &TargetArgs) -> Result<()> {
    let version = registry.require(target.to)?.clone();
    let features = target.features();
    let mut things = ThingTypeStorage::new(settings.durations);
    things.create_new(&version, features);
    let mut sprites = SpriteStorage::new();
    sprites.create_new(&version, features);
    compile(
        &mut things,
        &mut sprites,
        &target.out_dat,
        &target.out_spr,
        &version,
        features,
    )
}
