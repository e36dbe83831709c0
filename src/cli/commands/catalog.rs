use std::sync::Arc;

use serde_json::json;

use crate::cli::OutputFormat;
use crate::database::models::AutomationTemplate;
use crate::database::{Repository, Store};
use crate::filter::FilterData;
use crate::services::automation_service::TemplateSummary;
use crate::services::PlanService;

pub async fn plans(store: Arc<dyn Store>, output_format: OutputFormat) -> anyhow::Result<()> {
    let plans = PlanService::new(store).list_public().await?;
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plans)?),
        OutputFormat::Text => {
            println!(
                "{:<15} {:<15} {:>10} {:>10} {:>12} {:>6}",
                "SLUG", "NAME", "MONTHLY", "WORKFLOWS", "EXECUTIONS", "USERS"
            );
            println!("{}", "-".repeat(73));
            for plan in &plans {
                println!(
                    "{:<15} {:<15} {:>10} {:>10} {:>12} {:>6}",
                    plan.slug,
                    plan.name,
                    format!("{} {}", plan.price_monthly, plan.price_currency),
                    plan.max_workflows,
                    plan.max_executions_per_month,
                    plan.max_users
                );
            }
        }
    }
    Ok(())
}

pub async fn templates(store: Arc<dyn Store>, output_format: OutputFormat) -> anyhow::Result<()> {
    let filter = FilterData::matching(json!({ "is_active": true })).order_by("name asc");
    let templates: Vec<TemplateSummary> = Repository::<AutomationTemplate>::catalog(store)
        .find_many(filter)
        .await?
        .into_iter()
        .map(TemplateSummary::from)
        .collect();

    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&templates)?),
        OutputFormat::Text => {
            println!("{:<30} {:<30} {}", "SLUG", "NAME", "CATEGORY");
            println!("{}", "-".repeat(75));
            for template in &templates {
                println!("{:<30} {:<30} {}", template.slug, template.name, template.category);
            }
        }
    }
    Ok(())
}
