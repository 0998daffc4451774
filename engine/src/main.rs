//! Surveytab CLI - run survey-table pipelines from the terminal
//!
//! # Main Commands
//!
//! ```bash
//! surveytab show survey.csv            # Preview a dataset and its schema
//! surveytab run survey.csv -r r.json   # Execute a recipe file
//! surveytab recipe list                # Manage saved recipes
//! ```
//!
//! # Stage Commands
//!
//! ```bash
//! surveytab derive survey.csv --name Yield --expr yield.json
//! surveytab distance pairs.csv --km
//! surveytab filter survey.csv --predicate nearby.json
//! surveytab group survey.csv --by Crop --sum Production_mt
//! surveytab sort survey.csv --by Yield --desc --top 5
//! surveytab join owners.csv crops.csv --on Farm_ID
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use surveytab::{
    derive, drop_null, euclidean_distance, export_path, export_string, fill_null, filter,
    group_by, head, inner_join, load_path, load_path_with_delimiter, sort, AggSpec, Aggregate,
    Expr, FillWith, LoadReport, Predicate, Recipe, RecipeRegistry, SortOrder, Table, Value,
};

#[derive(Parser)]
#[command(name = "surveytab")]
#[command(about = "Load, transform, rank and export tabular survey data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Preview a dataset: schema, detected format, first rows
    Show {
        /// Input CSV file
        input: PathBuf,

        /// Number of rows to display
        #[arg(short, long, default_value = "10")]
        rows: usize,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,
    },

    /// Append a derived column from an expression JSON file
    Derive {
        /// Input CSV file
        input: PathBuf,

        /// Name of the new column
        #[arg(short, long)]
        name: String,

        /// Expression JSON file
        #[arg(short, long)]
        expr: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Append Euclidean distance between two coordinate pairs
    Distance {
        /// Input CSV file
        input: PathBuf,

        #[arg(long, default_value = "Lat1")]
        lat1: String,

        #[arg(long, default_value = "Lon1")]
        lon1: String,

        #[arg(long, default_value = "Lat2")]
        lat2: String,

        #[arg(long, default_value = "Lon2")]
        lon2: String,

        /// Name of the distance column
        #[arg(short, long, default_value = "Distance")]
        name: String,

        /// Also append a kilometer conversion column
        #[arg(long)]
        km: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Keep only rows matching a predicate JSON file
    Filter {
        /// Input CSV file
        input: PathBuf,

        /// Predicate JSON file
        #[arg(short, long)]
        predicate: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fill or drop null cells in a column
    Nulls {
        /// Input CSV file
        input: PathBuf,

        /// Column to clean
        #[arg(short, long)]
        column: String,

        /// Fill nulls with the column mean
        #[arg(long, conflicts_with_all = ["value", "drop"])]
        mean: bool,

        /// Fill nulls with a fixed value
        #[arg(long, conflicts_with = "drop")]
        value: Option<String>,

        /// Drop rows with a null in the column
        #[arg(long)]
        drop: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Group rows by key columns and aggregate
    Group {
        /// Input CSV file
        input: PathBuf,

        /// Key column(s)
        #[arg(short, long, required = true)]
        by: Vec<String>,

        /// Column(s) to sum
        #[arg(long)]
        sum: Vec<String>,

        /// Column(s) to average
        #[arg(long)]
        mean: Vec<String>,

        /// Column(s) to count
        #[arg(long)]
        count: Vec<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Stable sort by a column, optionally keeping the top N rows
    Sort {
        /// Input CSV file
        input: PathBuf,

        /// Sort column
        #[arg(short, long)]
        by: String,

        /// Sort descending (default: ascending)
        #[arg(long)]
        desc: bool,

        /// Keep only the first N rows after sorting
        #[arg(short, long)]
        top: Option<usize>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Inner-join two CSV files on a key column
    Join {
        /// Left CSV file
        left: PathBuf,

        /// Right CSV file
        right: PathBuf,

        /// Join key column, present in both files
        #[arg(long)]
        on: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Execute a pipeline recipe against a dataset
    Run {
        /// Input CSV file
        input: PathBuf,

        /// Recipe JSON file
        #[arg(short, long)]
        recipe: Option<PathBuf>,

        /// Use a saved recipe by ID instead of a file
        #[arg(long, conflicts_with = "recipe")]
        id: Option<String>,

        /// Save the recipe file to the registry after a successful run
        #[arg(long)]
        save: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage saved pipeline recipes
    Recipe {
        #[command(subcommand)]
        action: RecipeAction,
    },
}

#[derive(Subcommand)]
enum RecipeAction {
    /// List all stored recipes
    List,

    /// Import a recipe JSON file
    Import {
        /// Recipe JSON file to import
        file: PathBuf,
        /// Name for the recipe
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show details of a stored recipe
    Show {
        /// Recipe ID
        id: String,
    },

    /// Delete a stored recipe
    Delete {
        /// Recipe ID
        id: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Show {
            input,
            rows,
            delimiter,
        } => cmd_show(&input, rows, delimiter),

        Commands::Derive {
            input,
            name,
            expr,
            output,
        } => cmd_derive(&input, &name, &expr, output.as_deref()),

        Commands::Distance {
            input,
            lat1,
            lon1,
            lat2,
            lon2,
            name,
            km,
            output,
        } => cmd_distance(
            &input,
            [lat1.as_str(), lon1.as_str(), lat2.as_str(), lon2.as_str()],
            &name,
            km,
            output.as_deref(),
        ),

        Commands::Filter {
            input,
            predicate,
            output,
        } => cmd_filter(&input, &predicate, output.as_deref()),

        Commands::Nulls {
            input,
            column,
            mean,
            value,
            drop,
            output,
        } => cmd_nulls(&input, &column, mean, value.as_deref(), drop, output.as_deref()),

        Commands::Group {
            input,
            by,
            sum,
            mean,
            count,
            output,
        } => cmd_group(&input, &by, &sum, &mean, &count, output.as_deref()),

        Commands::Sort {
            input,
            by,
            desc,
            top,
            output,
        } => cmd_sort(&input, &by, desc, top, output.as_deref()),

        Commands::Join {
            left,
            right,
            on,
            output,
        } => cmd_join(&left, &right, &on, output.as_deref()),

        Commands::Run {
            input,
            recipe,
            id,
            save,
            output,
        } => cmd_run(&input, recipe.as_deref(), id.as_deref(), save, output.as_deref()),

        Commands::Recipe { action } => cmd_recipe(action),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Load a CSV and report what was detected, like the rest of the CLI.
fn load_input(input: &Path, delimiter: Option<char>) -> Result<LoadReport, Box<dyn std::error::Error>> {
    eprintln!("📄 Reading: {}", input.display());
    let report = match delimiter {
        Some(d) => load_path_with_delimiter(input, d)?,
        None => load_path(input)?,
    };
    eprintln!("   Encoding: {}", report.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(report.delimiter));
    eprintln!(
        "   {} rows, {} columns",
        report.table.n_rows(),
        report.table.n_cols()
    );
    Ok(report)
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

/// Export the result to a file, or print it as CSV on stdout.
fn write_output(table: &Table, path: Option<&Path>) -> CmdResult {
    match path {
        Some(p) => {
            export_path(table, p)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            print!("{}", export_string(table)?);
        }
    }
    Ok(())
}

fn cmd_show(input: &Path, rows: usize, delimiter: Option<char>) -> CmdResult {
    let report = load_input(input, delimiter)?;
    eprintln!();
    print!("{}", head(&report.table, rows));
    if report.table.n_rows() > rows {
        eprintln!("... ({} more rows)", report.table.n_rows() - rows);
    }
    Ok(())
}

fn cmd_derive(input: &Path, name: &str, expr_path: &Path, output: Option<&Path>) -> CmdResult {
    let report = load_input(input, None)?;

    let expr: Expr = serde_json::from_str(&std::fs::read_to_string(expr_path)?)?;
    eprintln!("⚙️  Deriving '{}' from: {}", name, expr.columns().join(", "));
    let table = derive(&report.table, name, &expr)?;

    write_output(&table, output)
}

fn cmd_distance(
    input: &Path,
    coords: [&str; 4],
    name: &str,
    km: bool,
    output: Option<&Path>,
) -> CmdResult {
    let report = load_input(input, None)?;

    let [lat1, lon1, lat2, lon2] = coords;
    eprintln!(
        "⚙️  Distance ({},{}) → ({},{}) as '{}'",
        lat1, lon1, lat2, lon2, name
    );
    let mut table = euclidean_distance(&report.table, lat1, lon1, lat2, lon2, name)?;
    if km {
        let km_name = format!("{}_km", name);
        table = surveytab::degrees_to_km(&table, name, &km_name)?;
        eprintln!("   Added '{}' (×{} km/degree)", km_name, surveytab::KM_PER_DEGREE);
    }

    write_output(&table, output)
}

fn cmd_filter(input: &Path, predicate_path: &Path, output: Option<&Path>) -> CmdResult {
    let report = load_input(input, None)?;

    let predicate: Predicate = serde_json::from_str(&std::fs::read_to_string(predicate_path)?)?;
    let table = filter(&report.table, &predicate)?;
    eprintln!(
        "✅ Kept {} of {} rows",
        table.n_rows(),
        report.table.n_rows()
    );

    write_output(&table, output)
}

fn cmd_nulls(
    input: &Path,
    column: &str,
    mean: bool,
    value: Option<&str>,
    drop: bool,
    output: Option<&Path>,
) -> CmdResult {
    let report = load_input(input, None)?;

    let table = if drop {
        let table = drop_null(&report.table, column)?;
        eprintln!(
            "✅ Dropped {} row(s) with null '{}'",
            report.table.n_rows() - table.n_rows(),
            column
        );
        table
    } else if mean {
        eprintln!("⚙️  Filling null '{}' with the column mean", column);
        fill_null(&report.table, column, &FillWith::Mean)?
    } else if let Some(raw) = value {
        eprintln!("⚙️  Filling null '{}' with '{}'", column, raw);
        fill_null(
            &report.table,
            column,
            &FillWith::Value {
                value: Value::parse(raw),
            },
        )?
    } else {
        return Err("specify one of --mean, --value or --drop".into());
    };

    write_output(&table, output)
}

fn cmd_group(
    input: &Path,
    by: &[String],
    sum: &[String],
    mean: &[String],
    count: &[String],
    output: Option<&Path>,
) -> CmdResult {
    let report = load_input(input, None)?;

    let mut specs = Vec::new();
    specs.extend(sum.iter().map(|c| AggSpec::new(c, Aggregate::Sum)));
    specs.extend(mean.iter().map(|c| AggSpec::new(c, Aggregate::Mean)));
    specs.extend(count.iter().map(|c| AggSpec::new(c, Aggregate::Count)));
    if specs.is_empty() {
        return Err("specify at least one of --sum, --mean or --count".into());
    }

    let table = group_by(&report.table, by, &specs)?;
    eprintln!("✅ {} group(s) over {}", table.n_rows(), by.join(" + "));

    write_output(&table, output)
}

fn cmd_sort(
    input: &Path,
    by: &str,
    desc: bool,
    top: Option<usize>,
    output: Option<&Path>,
) -> CmdResult {
    let report = load_input(input, None)?;

    let order = if desc {
        SortOrder::Descending
    } else {
        SortOrder::Ascending
    };
    let mut table = sort(&report.table, by, order)?;
    if let Some(n) = top {
        table = head(&table, n);
        eprintln!("✅ Top {} rows by '{}'", table.n_rows(), by);
    }

    write_output(&table, output)
}

fn cmd_join(left: &Path, right: &Path, on: &str, output: Option<&Path>) -> CmdResult {
    let left_report = load_input(left, None)?;
    let right_report = load_input(right, None)?;

    let table = inner_join(&left_report.table, &right_report.table, on)?;
    eprintln!("✅ Joined on '{}': {} row(s)", on, table.n_rows());

    write_output(&table, output)
}

fn cmd_run(
    input: &Path,
    recipe_path: Option<&Path>,
    id: Option<&str>,
    save: bool,
    output: Option<&Path>,
) -> CmdResult {
    let report = load_input(input, None)?;

    let (recipe, recipe_id, name) = match (recipe_path, id) {
        (Some(path), _) => {
            let recipe = Recipe::from_json(&std::fs::read_to_string(path)?)?;
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("recipe")
                .to_string();
            (recipe, None, name)
        }
        (None, Some(id)) => {
            let registry = RecipeRegistry::new();
            let stored = registry
                .get(id)
                .ok_or_else(|| format!("Recipe not found: {}", id))?;
            (stored.recipe.clone(), Some(id.to_string()), stored.name.clone())
        }
        (None, None) => {
            // Fall back to the best stored recipe whose columns all match.
            let registry = RecipeRegistry::new();
            let columns: Vec<String> = report
                .table
                .schema()
                .names()
                .into_iter()
                .map(String::from)
                .collect();
            let compatible = registry.find_compatible(&columns);
            let stored = compatible
                .first()
                .ok_or("no recipe given and no compatible stored recipe found")?;
            eprintln!(
                "🗂️  Using stored recipe: {} ({}, success rate {:.0}%)",
                stored.name,
                stored.id,
                stored.success_rate * 100.0
            );
            (stored.recipe.clone(), Some(stored.id.clone()), stored.name.clone())
        }
    };

    if !recipe.description.is_empty() {
        eprintln!("📋 {}", recipe.description);
    }
    eprintln!("⚙️  Executing {} step(s)...", recipe.steps.len());

    let result = recipe.run(&report.table);

    if let Some(ref rid) = recipe_id {
        let mut registry = RecipeRegistry::new();
        registry.update_stats(rid, result.is_ok());
    }

    let table = result?;
    eprintln!("✅ {} row(s), {} column(s)", table.n_rows(), table.n_cols());

    if save && recipe_path.is_some() {
        let mut registry = RecipeRegistry::new();
        let saved_id = registry.save(recipe, &name)?;
        eprintln!("💾 Recipe saved as: {}", saved_id);
    }

    write_output(&table, output)
}

fn cmd_recipe(action: RecipeAction) -> CmdResult {
    let mut registry = RecipeRegistry::new();

    match action {
        RecipeAction::List => {
            let recipes = registry.list();
            if recipes.is_empty() {
                eprintln!("📋 No recipes stored yet.");
                eprintln!("   Use 'surveytab recipe import <file>' to add one.");
                return Ok(());
            }

            eprintln!("📋 Stored recipes ({}):\n", recipes.len());
            for stored in recipes {
                println!("  📄 {} ({})", stored.name, stored.id);
                println!("     Columns: {}", stored.columns.join(", "));
                println!("     Steps: {}", stored.recipe.steps.len());
                println!("     Success rate: {:.0}%", stored.success_rate * 100.0);
                println!("     Uses: {}", stored.use_count);
                if let Some(ref last) = stored.last_used {
                    println!("     Last used: {}", last);
                }
                println!();
            }
        }

        RecipeAction::Import { file, name } => {
            eprintln!("📥 Importing recipe from: {}", file.display());
            let id = registry.import(&file, name.as_deref())?;
            eprintln!("✅ Recipe saved with ID: {}", id);
        }

        RecipeAction::Show { id } => match registry.get(&id) {
            Some(stored) => {
                println!("📄 Recipe: {} ({})\n", stored.name, stored.id);
                println!("Columns: {}", stored.columns.join(", "));
                println!("Created: {}", stored.created_at);
                println!("Success rate: {:.0}%", stored.success_rate * 100.0);
                println!("Uses: {}", stored.use_count);
                println!("\nSteps:");
                println!("{}", stored.recipe.to_json()?);
            }
            None => {
                return Err(format!("Recipe not found: {}", id).into());
            }
        },

        RecipeAction::Delete { id } => {
            registry.delete(&id)?;
            eprintln!("🗑️  Recipe deleted: {}", id);
        }
    }

    Ok(())
}
