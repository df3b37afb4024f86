use anyhow::{anyhow, bail, Result};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use spa::{
    core::SpaConfig,
    facts::{Dimension, FactQuery, FactValue, SqlSearch},
    storage::ReportFilter,
    BulkOutcome, Spa,
};
use std::fs;
use std::io::stdout;
use std::path::{Path, PathBuf};
use structopt::StructOpt;
use uuid::Uuid;

#[derive(StructOpt, Debug)]
#[structopt(name = "spa-cli", about = "Parse Oracle AWR reports and chart their statistics")]
enum Command {
    /// Parse a report and print the document as JSON, without storing it
    Parse {
        #[structopt(parse(from_os_str))]
        file: PathBuf,
    },
    /// Store and parse one or more reports
    Ingest {
        #[structopt(parse(from_os_str), required = true)]
        files: Vec<PathBuf>,
    },
    /// List stored reports
    Reports,
    /// Parse every stored report again from its original file
    Reparse,
    /// Manage datasets
    Dataset(DatasetCommand),
    /// Print a chart of facts as JSON, or CSV with --csv
    Graph(FactOpt),
    /// Print the latest value of each fact
    Table(FactOpt),
    /// Search SQL statements of one database instance
    Sql(SqlOpt),
}

#[derive(StructOpt, Debug)]
enum DatasetCommand {
    Create {
        name: String,
        #[structopt(long, default_value = "")]
        description: String,
    },
    List,
    /// Add reports and recalculate
    Assign { dataset: Uuid, reports: Vec<Uuid> },
    /// Drop reports and recalculate
    Unassign { dataset: Uuid, reports: Vec<Uuid> },
    Recalc { dataset: Uuid },
    Remove { dataset: Uuid },
}

#[derive(StructOpt, Debug)]
struct FactOpt {
    #[structopt(long)]
    dataset: Uuid,
    #[structopt(long)]
    category: Option<String>,
    /// Fact name; repeat for several
    #[structopt(long = "name")]
    names: Vec<String>,
    /// Dimension filter as NAME=VALUE; repeat for several
    #[structopt(long = "dim", parse(try_from_str = parse_dimension))]
    dimensions: Vec<Dimension>,
    /// Fact name to leave out; repeat for several
    #[structopt(long)]
    skip: Vec<String>,
    /// Keep the N names with the largest total
    #[structopt(long)]
    limit: Option<usize>,
    #[structopt(long)]
    csv: bool,
}

#[derive(StructOpt, Debug)]
struct SqlOpt {
    #[structopt(long)]
    dataset: Uuid,
    #[structopt(long)]
    db: String,
    #[structopt(long)]
    instance: String,
    /// SQL id prefix
    #[structopt(long, conflicts_with = "text")]
    id: Option<String>,
    /// Fragment of the statement text
    #[structopt(long)]
    text: Option<String>,
}

fn parse_dimension(s: &str) -> Result<Dimension> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected NAME=VALUE, got {}", s))?;
    Ok(Dimension::new(name.trim(), value.trim()))
}

impl FactOpt {
    fn query(&self) -> Result<FactQuery> {
        if self.category.is_none() && self.names.is_empty() {
            bail!("Either --category or --name is required");
        }
        Ok(FactQuery {
            dataset_id: self.dataset,
            dimensions: self.dimensions.clone(),
            category: self.category.clone(),
            names: self.names.clone(),
            skip: self.skip.clone(),
            limit: self.limit,
        })
    }
}

fn print_outcome(action: &str, outcome: &BulkOutcome) {
    if outcome.is_success() {
        println!(
            "{} {} ({} reports)",
            "✓".green(),
            action,
            outcome.succeeded.len()
        );
        return;
    }
    println!(
        "{} {}: {} ok, {} failed",
        "✗".red(),
        action,
        outcome.succeeded.len(),
        outcome.failed.len()
    );
    for (id, message) in &outcome.failed {
        println!("  {} {}", id.to_string().yellow(), message);
    }
}

async fn ingest(spa: &Spa, files: &[PathBuf]) -> Result<()> {
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut failed = 0;
    for file in files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());
        pb.set_message(name.clone());

        let result = match fs::read(file) {
            Ok(bytes) => spa.reports.ingest(bytes, &name).await.map_err(anyhow::Error::from),
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(id) => pb.println(format!("{} {} {}", "✓".green(), id, name)),
            Err(e) => {
                failed += 1;
                pb.println(format!("{} {}: {}", "✗".red(), name, e));
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");

    if failed > 0 {
        bail!("{} of {} files failed", failed, files.len());
    }
    Ok(())
}

async fn dataset(spa: &Spa, command: DatasetCommand) -> Result<()> {
    match command {
        DatasetCommand::Create { name, description } => {
            let dataset = spa.datasets.create(&name, &description).await?;
            println!("{} {}", "Created".green(), dataset.id);
        }
        DatasetCommand::List => {
            for dataset in spa.datasets.list().await? {
                println!(
                    "{}  {}  {}  {} reports  {}",
                    dataset.id,
                    dataset.name.bold(),
                    dataset.created_at.format("%Y-%m-%d %H:%M"),
                    dataset.report_ids.len(),
                    dataset.description.dimmed()
                );
            }
        }
        DatasetCommand::Assign { dataset, reports } => {
            let outcome = spa.datasets.assign(dataset, &reports).await?;
            print_outcome("Assigned", &outcome);
        }
        DatasetCommand::Unassign { dataset, reports } => {
            let outcome = spa.datasets.unassign(dataset, &reports).await?;
            print_outcome("Unassigned", &outcome);
        }
        DatasetCommand::Recalc { dataset } => {
            let outcome = spa.datasets.recalculate(dataset).await?;
            print_outcome("Recalculated", &outcome);
        }
        DatasetCommand::Remove { dataset } => {
            if spa.datasets.remove(dataset).await? {
                println!("{} {}", "Removed".green(), dataset);
            } else {
                println!("{} {}", "No such dataset".yellow(), dataset);
            }
        }
    }
    Ok(())
}

/// Prints the parsed document as JSON; needs no store.
fn parse(file: &Path, config: &SpaConfig) -> Result<()> {
    let name = file.display().to_string();
    let document = spa::parse(fs::File::open(file)?, &name, &config.parser_options())?;
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let command = Command::from_args();
    let config = SpaConfig::from_env()?;

    let spa = match &command {
        Command::Parse { file } => return parse(file, &config),
        _ => Spa::open(&config).await?,
    };

    match command {
        Command::Parse { .. } => unreachable!("parse runs without opening the store"),
        Command::Ingest { files } => ingest(&spa, &files).await?,
        Command::Reports => {
            for report in spa.reports.list(&ReportFilter::All).await? {
                println!(
                    "{}  {}  {}/{}  {}  {} .. {}",
                    report.id,
                    report.original_file_name.bold(),
                    report.db_name.as_deref().unwrap_or("?"),
                    report.instance.as_deref().unwrap_or("?"),
                    report.host_name.as_deref().unwrap_or("?"),
                    report.begin_snap_time.as_deref().unwrap_or("?"),
                    report.end_snap_time.as_deref().unwrap_or("?"),
                );
            }
        }
        Command::Reparse => {
            let outcome = spa.reports.reparse_all().await?;
            print_outcome("Reparsed", &outcome);
        }
        Command::Dataset(command) => dataset(&spa, command).await?,
        Command::Graph(opt) => {
            let chart = spa.facts.graph(&opt.query()?).await?;
            if opt.csv {
                chart.write_csv(stdout())?;
            } else {
                println!("{}", serde_json::to_string_pretty(&chart.to_chart_json())?);
            }
        }
        Command::Table(opt) => {
            for (name, value) in spa.facts.table(&opt.query()?).await? {
                let value = match value {
                    FactValue::Number(n) => n.to_string(),
                    FactValue::Text(s) => s,
                };
                println!("{}\t{}", name.bold(), value);
            }
        }
        Command::Sql(opt) => {
            let search = match (opt.id, opt.text) {
                (Some(id), _) => SqlSearch::IdPrefix(id),
                (None, Some(text)) => SqlSearch::Text(text),
                (None, None) => bail!("Either --id or --text is required"),
            };
            let hits = spa
                .facts
                .search_sql(opt.dataset, &opt.db, &opt.instance, &search)
                .await?;
            for hit in hits {
                let text = match hit.highlight {
                    Some((from, to)) => {
                        let chars: Vec<char> = hit.text.chars().collect();
                        let before: String = chars[..from].iter().collect();
                        let matched: String = chars[from..to].iter().collect();
                        let after: String = chars[to..].iter().collect();
                        format!("{}{}{}", before, matched.red().bold(), after)
                    }
                    None => hit.text,
                };
                println!("{}  {}", hit.sql_id.cyan(), text);
            }
        }
    }

    Ok(())
}
