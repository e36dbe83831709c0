//! Built-in catalog: subscription plans and automation templates.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;

use super::models::{AutomationTemplate, Plan};
use super::repository::Repository;
use super::store::{Store, StoreError};

pub fn default_plans() -> Vec<Value> {
    vec![
        json!({
            "name": "Start",
            "slug": "start",
            "description": "For small businesses getting started with automation.",
            "price_monthly": 49.0,
            "price_currency": "CHF",
            "max_workflows": 5,
            "max_executions_per_month": 500,
            "max_users": 2,
            "features": [
                "MooveLabs hosting and VPS",
                "PostgreSQL database",
                "n8n with up to 5 workflows",
                "Basic monitoring",
                "SSL and security",
                "2 integrations (WhatsApp, email, simple CRM)"
            ],
            "is_active": true,
            "is_public": true
        }),
        json!({
            "name": "Professional",
            "slug": "professional",
            "description": "For companies running real automations every day.",
            "price_monthly": 149.0,
            "price_currency": "CHF",
            "max_workflows": 15,
            "max_executions_per_month": 2000,
            "max_users": 5,
            "features": [
                "Everything in Start",
                "15 n8n workflows",
                "Built-in AI (Gemini/OpenAI)",
                "CRM, ERP, website and API integrations",
                "Simple dashboards",
                "Dedicated database",
                "Professional support (up to 10h/month)"
            ],
            "is_active": true,
            "is_public": true
        }),
        json!({
            "name": "Business",
            "slug": "business",
            "description": "For companies that depend on automations and need performance.",
            "price_monthly": 299.0,
            "price_currency": "CHF",
            "max_workflows": 100,
            "max_executions_per_month": 10000,
            "max_users": 20,
            "features": [
                "Unlimited workflows",
                "AI with custom training",
                "24/7 monitoring",
                "Dedicated database with automatic backups",
                "Optimized VPS",
                "Advanced customizations",
                "Premium support (priority response)"
            ],
            "is_active": true,
            "is_public": true
        }),
        json!({
            "name": "Enterprise",
            "slug": "enterprise",
            "description": "A custom CRM built by MooveLabs with integrated AI.",
            "price_monthly": 990.0,
            "price_currency": "CHF",
            "max_workflows": 999,
            "max_executions_per_month": 99999,
            "max_users": 999,
            "features": [
                "Fully custom CRM development",
                "Complete MooveLabs infrastructure",
                "AI integrated into the CRM",
                "Admin panels",
                "Unlimited users",
                "Custom reports and modules",
                "n8n automation integration",
                "Dedicated premium support",
                "Dedicated hosting, database and security"
            ],
            "is_active": true,
            "is_public": true
        }),
    ]
}

pub fn default_templates() -> Vec<Value> {
    vec![
        json!({
            "name": "WhatsApp Lead Capture",
            "slug": "lead-capture-whatsapp",
            "description": "Receives WhatsApp messages and stores the leads in a Google Sheets spreadsheet.",
            "category": "marketing",
            "icon": "📱",
            "required_inputs": [
                { "key": "whatsappToken", "label": "WhatsApp Business token", "type": "password" },
                { "key": "sheetId", "label": "Google Sheets spreadsheet ID", "type": "text" }
            ],
            "workflow_json": {
                "nodes": [
                    {
                        "name": "Webhook",
                        "type": "n8n-nodes-base.webhook",
                        "parameters": { "path": "whatsapp-lead" },
                        "position": [250, 300]
                    },
                    {
                        "name": "Save Lead",
                        "type": "n8n-nodes-base.googleSheets",
                        "parameters": { "sheetId": "{{config.sheetId}}" },
                        "position": [450, 300]
                    }
                ],
                "connections": {}
            },
            "is_active": true,
            "is_public": true
        }),
        json!({
            "name": "Order Notification",
            "slug": "order-notification",
            "description": "Sends an email and WhatsApp notification when a new order is created.",
            "category": "sales",
            "icon": "🛒",
            "required_inputs": [
                { "key": "emailTo", "label": "Notification email", "type": "email" },
                { "key": "whatsappNumber", "label": "WhatsApp number", "type": "phone" }
            ],
            "workflow_json": {
                "nodes": [
                    {
                        "name": "Order Webhook",
                        "type": "n8n-nodes-base.webhook",
                        "parameters": { "path": "new-order" },
                        "position": [250, 300]
                    }
                ],
                "connections": {}
            },
            "is_active": true,
            "is_public": true
        }),
        json!({
            "name": "Email Auto Reply",
            "slug": "auto-reply-email",
            "description": "Automatically answers incoming email with a custom message.",
            "category": "support",
            "icon": "✉️",
            "required_inputs": [
                { "key": "imapHost", "label": "IMAP server", "type": "text" },
                { "key": "imapUser", "label": "Email", "type": "email" },
                { "key": "imapPassword", "label": "Password", "type": "password" },
                { "key": "replyMessage", "label": "Reply message", "type": "textarea" }
            ],
            "workflow_json": {
                "nodes": [
                    {
                        "name": "Email Trigger",
                        "type": "n8n-nodes-base.emailReadImap",
                        "parameters": {},
                        "position": [250, 300]
                    }
                ],
                "connections": {}
            },
            "is_active": true,
            "is_public": true
        }),
    ]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub plans: usize,
    pub templates: usize,
}

/// Create or refresh the built-in catalog, keyed by slug. Safe to rerun.
pub async fn seed_catalog(store: Arc<dyn Store>) -> Result<SeedReport, StoreError> {
    let plans = Repository::<Plan>::catalog(store.clone());
    let templates = Repository::<AutomationTemplate>::catalog(store);
    let mut report = SeedReport::default();

    for plan in default_plans() {
        let slug = plan["slug"].clone();
        let saved = plans.upsert(json!({ "slug": slug }), plan.clone(), plan).await?;
        info!("Plan \"{}\" seeded", saved.name);
        report.plans += 1;
    }

    for template in default_templates() {
        let slug = template["slug"].clone();
        let saved = templates.upsert(json!({ "slug": slug }), template.clone(), template).await?;
        info!("Template \"{}\" seeded", saved.name);
        report.templates += 1;
    }

    Ok(report)
}
