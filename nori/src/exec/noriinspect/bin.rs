use clap::{ArgAction, Parser};
use nori::{BindingTable, SetBindings};

/// CLI arguments for inspecting compiled binding tables.
#[derive(Debug, Parser)]
#[command(author, version, about = "Inspect compiled nori binding tables", long_about = None)]
struct Args {
    /// Path to the binding table artifact to inspect
    file: String,

    /// Emit the table as pretty-printed JSON
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let table = BindingTable::<String>::load_from_disk(&args.file)
        .map_err(|err| format!("{}: {err}", args.file))?;

    if args.json {
        let json = serde_json::to_string_pretty(&table)?;
        println!("{json}");
    } else {
        print_summary(&table);
    }

    Ok(())
}

fn print_summary(table: &BindingTable<String>) {
    println!("Descriptor sets: {}", table.set_count());

    for (index, set) in table.sets().iter().enumerate() {
        let operations = match set {
            SetBindings::NoOp => {
                println!("set {index}: no-op");
                continue;
            }
            SetBindings::Operations(operations) => operations,
        };

        println!("set {index}:");
        for op in operations.iter() {
            println!("  {op}");
        }
    }

    println!("Operations: {}", table.operation_count());
}
