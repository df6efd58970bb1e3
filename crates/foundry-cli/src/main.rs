use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use foundry_core::{Category, ProviderTier, SearchParams, SkillMatchMode, SortBy, SortOrder};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "foundry-cli")]
#[command(about = "Foundry marketplace search command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one search and print the JSON response.
    Search(SearchArgs),
    /// Serve the HTTP search API.
    Serve,
}

#[derive(Debug, Args)]
struct SearchArgs {
    #[arg(long, short)]
    query: Option<String>,
    #[arg(long)]
    category: Option<Category>,
    #[arg(long, value_delimiter = ',')]
    subcategories: Vec<String>,
    #[arg(long)]
    min_price: Option<f64>,
    #[arg(long)]
    max_price: Option<f64>,
    #[arg(long)]
    min_rating: Option<f64>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long, value_delimiter = ',')]
    tiers: Vec<ProviderTier>,
    #[arg(long)]
    available_from: Option<NaiveDate>,
    #[arg(long)]
    available_to: Option<NaiveDate>,
    #[arg(long, value_delimiter = ',')]
    skills: Vec<String>,
    #[arg(long)]
    skill_match: Option<SkillMatchMode>,
    #[arg(long, value_delimiter = ',')]
    certifications: Vec<String>,
    #[arg(long)]
    sort_by: Option<SortBy>,
    #[arg(long)]
    sort_order: Option<SortOrder>,
    #[arg(long)]
    page: Option<u32>,
    #[arg(long)]
    limit: Option<u32>,
    #[arg(long)]
    user_id: Option<Uuid>,
}

impl From<SearchArgs> for SearchParams {
    fn from(args: SearchArgs) -> Self {
        Self {
            query: args.query,
            category: args.category,
            subcategories: args.subcategories,
            min_price: args.min_price,
            max_price: args.max_price,
            min_rating: args.min_rating,
            location: args.location,
            tiers: args.tiers,
            available_from: args.available_from,
            available_to: args.available_to,
            skills: args.skills,
            skill_match: args.skill_match,
            certifications: args.certifications,
            sort_by: args.sort_by,
            sort_order: args.sort_order,
            page: args.page,
            limit: args.limit,
            user_id: args.user_id,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Search(args) => {
            let service = foundry_search::build_service_from_env().await?;
            let response = service.search(args.into()).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Serve => {
            foundry_web::serve_from_env().await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_search_flags_into_params() {
        let cli = Cli::try_parse_from([
            "foundry-cli",
            "search",
            "--query",
            "gas engineer",
            "--category",
            "services",
            "--tiers",
            "verified,premium",
            "--sort-by",
            "most_reviews",
            "--sort-order",
            "asc",
            "--available-from",
            "2026-04-01",
        ])
        .unwrap();
        let Some(Commands::Search(args)) = cli.command else {
            panic!("expected search command");
        };
        let params = SearchParams::from(args);
        assert_eq!(params.query.as_deref(), Some("gas engineer"));
        assert_eq!(params.category, Some(Category::Services));
        assert_eq!(params.tiers, vec![ProviderTier::Verified, ProviderTier::Premium]);
        assert_eq!(params.sort_by, Some(SortBy::MostReviews));
        assert_eq!(params.sort_order, Some(SortOrder::Asc));
        assert_eq!(params.available_from, NaiveDate::from_ymd_opt(2026, 4, 1));
    }

    #[test]
    fn rejects_unknown_tier() {
        assert!(Cli::try_parse_from(["foundry-cli", "search", "--tiers", "gold"]).is_err());
    }
}
