use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use journey_analytics::schema::FeatureDomain;
use journey_analytics::{aggregate, funnel, report};
use journey_analytics::{ArtifactPaths, DefaultPolicy, FeatureInput, Resources};

#[derive(Parser)]
#[command(name = "journey-analytics")]
#[command(about = "Multi-channel customer journey analytics and purchase prediction", long_about = None)]
struct Cli {
    /// Interaction log CSV
    #[arg(long, global = true, env = "JOURNEY_EVENTS_CSV", default_value = "interface.csv")]
    events: PathBuf,
    /// Reference dataset used to derive input ranges and choices
    #[arg(long, global = true, env = "JOURNEY_TEMPLATE_CSV", default_value = "MLF.csv")]
    template: PathBuf,
    /// Classifier artifact (JSON)
    #[arg(long, global = true, env = "JOURNEY_MODEL_JSON", default_value = "model.json")]
    model: PathBuf,
    /// Fitted scaler artifact (JSON)
    #[arg(long, global = true, env = "JOURNEY_SCALER_JSON", default_value = "scaler.json")]
    scaler: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Headline figures: customers, average duration, conversion rate
    Summary,
    /// Non-purchase interactions by type, least frequent first
    Dropoff,
    /// Interaction counts and average duration per channel
    Channels,
    /// Customers reaching each funnel stage
    Funnel {
        /// Stage names in funnel order (defaults to the purchase funnel)
        #[arg(long = "stage")]
        stages: Vec<String>,
    },
    /// Write a markdown report of all summaries
    Report {
        #[arg(long, default_value = "journey-report.md")]
        out: PathBuf,
    },
    /// List the page/product labels accepted for the first point of interest
    Categories,
    /// Show the inputs the model expects and their allowed values
    Schema,
    /// Predict whether a customer completes a purchase
    Predict {
        /// Feature value as name=value; repeat for each feature
        #[arg(long = "set", value_parser = parse_assignment)]
        values: Vec<(String, String)>,
        /// Page or product that first caught the customer's attention
        #[arg(long)]
        category: String,
        /// Fill unset numeric features with the reference-data default
        #[arg(long)]
        fill_defaults: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got {raw:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing feature name in {raw:?}"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("journey_analytics=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let resources = Resources::new(ArtifactPaths {
        events: cli.events,
        template: cli.template,
        model: cli.model,
        scaler: cli.scaler,
    });

    match cli.command {
        Commands::Summary => {
            let table = resources.events().context("failed to load interaction log")?;
            let kpis = aggregate::kpis(&table);
            println!("Total unique customers: {}", kpis.unique_customers);
            println!("Avg duration (s): {:.1}", kpis.avg_duration);
            println!("Conversion rate: {:.2}%", kpis.conversion_rate * 100.0);
        }
        Commands::Dropoff => {
            let table = resources.events().context("failed to load interaction log")?;
            let counts = aggregate::dropoff_counts(table.events());
            if counts.is_empty() {
                println!("No non-purchase interactions recorded.");
                return Ok(());
            }
            println!("Drop-off by interaction type (excludes purchases):");
            for row in counts {
                println!("- {}: {}", row.category, row.count);
            }
        }
        Commands::Channels => {
            let table = resources.events().context("failed to load interaction log")?;
            println!("Total interactions by channel:");
            for row in aggregate::channel_totals(table.events()) {
                println!("- {}: {}", row.category, row.count);
            }
            println!("Average interaction duration by channel:");
            for row in aggregate::avg_duration_by_channel(table.events()) {
                println!("- {}: {:.1}s", row.channel, row.avg_duration);
            }
        }
        Commands::Funnel { stages } => {
            let table = resources.events().context("failed to load interaction log")?;
            let stages = if stages.is_empty() {
                funnel::default_stages()
            } else {
                stages
            };
            println!("Sequential customer funnel (unique customers):");
            for row in funnel::compute_funnel(table.events(), &stages) {
                println!("- {}: {}", row.stage, row.customers);
            }
        }
        Commands::Report { out } => {
            let table = resources.events().context("failed to load interaction log")?;
            let report =
                report::build_report(&table, &funnel::default_stages(), chrono::Utc::now());
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Categories => {
            for (code, label) in resources.categories().entries() {
                println!("{code:>3}  {label}");
            }
        }
        Commands::Schema => {
            let schema = resources.schema().context("failed to load prediction artifacts")?;
            for spec in schema.features() {
                let scaled = if schema.is_scaled(&spec.name) { " (scaled)" } else { "" };
                let domain = match &spec.domain {
                    FeatureDomain::Categorical { choices }
                    | FeatureDomain::Labelled { choices } => {
                        format!("one of [{}]", choices.join(", "))
                    }
                    FeatureDomain::Numeric { min, max, default } => {
                        format!("{min} to {max}, default {default}")
                    }
                    FeatureDomain::CategoryCode => "page/product label (see `categories`)".into(),
                    FeatureDomain::Unconstrained => "any number".into(),
                };
                println!("{}{}: {}", spec.name, scaled, domain);
            }
        }
        Commands::Predict {
            values,
            category,
            fill_defaults,
            json,
        } => {
            let mut inputs: HashMap<String, FeatureInput> = values
                .iter()
                .map(|(name, value)| (name.clone(), FeatureInput::parse(value)))
                .collect();
            inputs.insert(
                journey_analytics::category::CATEGORY_FEATURE.to_string(),
                FeatureInput::Label(category),
            );
            let policy = if fill_defaults {
                DefaultPolicy::NumericDefaults
            } else {
                DefaultPolicy::FailFast
            };

            let outcome = resources
                .predict(&inputs, policy)
                .context("prediction request failed")?;
            let result = &outcome.result;

            if json {
                println!("{}", serde_json::to_string_pretty(result)?);
                return Ok(());
            }

            println!(
                "{} (confidence: {:.2}%)",
                result.headline(),
                result.confidence() * 100.0
            );
            if result.is_unlikely() {
                println!("This customer seems highly unlikely to convert. Try different inputs.");
            }
            println!("Will purchase: {:.2}%", result.probabilities[1] * 100.0);
            println!("Will not purchase: {:.2}%", result.probabilities[0] * 100.0);
        }
    }

    Ok(())
}
