use clap::{ArgAction, Parser};
use nori::{
    BindingTable, DescriptorSetLayouts, ResourceBinder, SetBindings, ShaderReflection,
    profiling::{LogSink, Profiler, ProfilerSettings},
};
use std::path::PathBuf;

/// CLI surface for compiling binding tables from layout and reflection JSON.
#[derive(Debug, Parser)]
#[command(author, version, about = "Compile descriptor-set layouts against shader reflection", long_about = None)]
struct Args {
    /// Path to the descriptor-set layouts (JSON)
    layout: String,

    /// Path to the shader reflection (JSON)
    reflection: String,

    /// Output path for the compiled binding table
    #[arg(short, long, value_name = "PATH", default_value = "out.nbt")]
    output: String,

    /// Print the compiled binding operations
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Report compile timing through the profiler
    #[arg(long, action = ArgAction::SetTrue)]
    profile: bool,

    /// Profiler settings (JSON) used with --profile
    #[arg(long, value_name = "PATH", requires = "profile")]
    profile_settings: Option<String>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_filter = match (args.verbose, args.profile) {
        (true, _) => "debug",
        (false, true) => "warn,nori::profiling=debug",
        (false, false) => "warn",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let layouts = DescriptorSetLayouts::<String>::load_from_json(&args.layout)
        .map_err(|err| format!("{}: {err}", args.layout))?;
    let reflection = ShaderReflection::load_from_json(&args.reflection)
        .map_err(|err| format!("{}: {err}", args.reflection))?;

    let profiler = if args.profile {
        let settings = match &args.profile_settings {
            Some(path) => ProfilerSettings::load_from_json(path)?,
            None => ProfilerSettings {
                enabled_keys: vec![nori::COMPILE_PROFILING_KEY.to_string()],
                ..Default::default()
            },
        };
        Some(Profiler::from_settings(&settings, LogSink)?)
    } else {
        None
    };

    let binder = ResourceBinder::compile(&layouts, &reflection, profiler.as_ref());

    if let Some(profiler) = &profiler {
        profiler.shutdown();
    }

    if args.verbose {
        print_table(binder.table());
    }

    let output_path = ensure_nbt_extension(&args.output);
    let output_path = output_path
        .to_str()
        .ok_or("output path is not valid UTF-8")?;
    binder.table().save_to_disk(output_path)?;

    Ok(())
}

fn print_table(table: &BindingTable<String>) {
    println!("Descriptor sets: {}", table.set_count());
    for (index, set) in table.sets().iter().enumerate() {
        match set {
            SetBindings::NoOp => println!("  set {index}: no-op"),
            SetBindings::Operations(operations) => {
                println!("  set {index}:");
                for op in operations.iter() {
                    println!("    {op}");
                }
            }
        }
    }
    println!("Operations: {}", table.operation_count());
}

fn ensure_nbt_extension(path: &str) -> PathBuf {
    let mut path = PathBuf::from(path);
    path.set_extension("nbt");
    path
}
