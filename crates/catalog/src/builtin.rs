use crate::definition::{Category, CommandDefinition};
use crate::params::ParameterSpec as P;
use opsdeck_policy::Role;

const EVERYONE: &[Role] = &Role::ALL;
const CONTRIBUTORS: &[Role] = Role::CONTRIBUTORS;
const SENIORS: &[Role] = &[Role::Admin, Role::Manager, Role::SeniorDc];

const SCENARIO_TYPES: &[&str] = &["cloud-posture", "threat-hunting", "incident-response"];

#[allow(clippy::too_many_arguments)]
fn command(
    id: &str,
    name: &str,
    description: &str,
    text_form: &str,
    action_name: &str,
    category: Category,
    roles: &[Role],
    parameters: Vec<P>,
) -> CommandDefinition {
    CommandDefinition {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        text_form: text_form.to_string(),
        action_name: action_name.to_string(),
        category,
        required_roles: roles.to_vec(),
        parameters,
    }
}

/// The static catalog shipped with the service.
pub fn definitions() -> Vec<CommandDefinition> {
    use Category::*;

    vec![
        // POV lifecycle
        command(
            "pov_create",
            "Create POV",
            "Initialize a new Proof of Value project",
            "pov create --interactive",
            "dashboard.newPOV",
            Pov,
            CONTRIBUTORS,
            vec![
                P::string("customer", "Customer name").required(),
                P::enumeration("template", "POV template", &["standard", "enterprise", "custom"]),
            ],
        ),
        command(
            "pov_list",
            "List POVs",
            "List active Proof of Value projects",
            "pov list --active",
            "dashboard.activePOVs",
            Pov,
            EVERYONE,
            vec![P::enumeration(
                "status",
                "Filter by status",
                &["active", "completed", "pending", "all"],
            )],
        ),
        command(
            "pov_report",
            "Generate POV Report",
            "Create executive or technical POV report",
            "pov report --current",
            "dashboard.generateReport",
            Pov,
            CONTRIBUTORS,
            vec![
                P::enumeration("type", "Report type", &["executive", "technical", "summary"]).required(),
                P::enumeration("format", "Output format", &["pdf", "excel", "word"]).with_default("pdf"),
            ],
        ),
        command(
            "pov_blueprint",
            "Create Transformation Blueprint",
            "Generate transformation blueprint PDF",
            "pov --blueprint",
            "dashboard.blueprint",
            Pov,
            CONTRIBUTORS,
            vec![P::string("customer", "Customer name for blueprint").required()],
        ),
        // TRR records
        command(
            "trr_create",
            "Create TRR",
            "Create new Technical Requirements Review",
            "trr create --interactive",
            "trr.createNew",
            Trr,
            CONTRIBUTORS,
            vec![
                P::string("title", "TRR title").required(),
                P::enumeration(
                    "category",
                    "TRR category",
                    &["security", "integration", "performance", "compliance"],
                )
                .required(),
            ],
        ),
        command(
            "trr_list",
            "List TRRs",
            "List all Technical Requirements Reviews",
            "trr list",
            "trr.listTRRs",
            Trr,
            EVERYONE,
            vec![P::enumeration(
                "status",
                "Filter by status",
                &["pending", "validated", "in-review", "all"],
            )],
        ),
        command(
            "trr_import",
            "Import TRR CSV",
            "Import TRR data from CSV file",
            "trr import",
            "trr.importCSV",
            Trr,
            CONTRIBUTORS,
            vec![P::file("file", "CSV file to import").required()],
        ),
        command(
            "trr_validate",
            "Validate TRRs",
            "Validate pending TRRs",
            "trr validate --all",
            "trr.validate",
            Trr,
            CONTRIBUTORS,
            vec![P::enumeration("scope", "Validation scope", &["all", "pending", "assigned"])
                .with_default("pending")],
        ),
        command(
            "trr_export",
            "Export TRRs",
            "Export TRR data as CSV/Excel",
            "trr export",
            "trr.export",
            Trr,
            CONTRIBUTORS,
            vec![P::enumeration("format", "Export format", &["csv", "excel", "json"]).with_default("csv")],
        ),
        // Scenarios
        command(
            "scenario_list",
            "List Scenarios",
            "Browse available security scenarios",
            "scenario list",
            "dashboard.listScenarios",
            Scenario,
            CONTRIBUTORS,
            vec![P::enumeration(
                "type",
                "Scenario type",
                &["cloud-posture", "threat-hunting", "incident-response", "all"],
            )],
        ),
        command(
            "scenario_deploy",
            "Deploy Scenario",
            "Deploy security scenario",
            "scenario generate",
            "dashboard.deployScenario",
            Scenario,
            CONTRIBUTORS,
            vec![
                P::enumeration("type", "Scenario type", SCENARIO_TYPES).required(),
                P::enumeration("environment", "Target environment", &["dev", "staging", "prod"])
                    .with_default("dev"),
            ],
        ),
        command(
            "scenario_validate",
            "Validate Scenario",
            "Validate scenario deployment",
            "scenario validate",
            "scenarios.validate",
            Scenario,
            CONTRIBUTORS,
            vec![P::string("scenarioId", "Scenario ID to validate").required()],
        ),
        // AI & analytics
        command(
            "ai_query",
            "AI Query",
            "Quick AI assistance query",
            "ai",
            "ai.quickQuery",
            Ai,
            EVERYONE,
            vec![P::string("query", "Question or request for AI").required()],
        ),
        command(
            "gemini_analyze",
            "AI Analysis",
            "Run comprehensive AI analysis",
            "gemini analyze",
            "ai.runAnalysis",
            Ai,
            CONTRIBUTORS,
            vec![P::enumeration("context", "Analysis context", &["dashboard", "pov", "trr", "scenario"])
                .with_default("dashboard")],
        ),
        command(
            "gemini_predict",
            "Predictive Insights",
            "Generate timeline and risk predictions",
            "gemini predict",
            "ai.predictiveInsights",
            Ai,
            SENIORS,
            vec![P::enumeration("scope", "Prediction scope", &["timeline", "risks", "both"])
                .with_default("both")],
        ),
        // Content creation
        command(
            "content_create_pov",
            "Quick POV Setup",
            "Initialize POV with template",
            "pov init",
            "creator.quickPOVSetup",
            Content,
            CONTRIBUTORS,
            vec![P::enumeration(
                "template",
                "POV template",
                &["executive-overview", "technical-deep-dive", "comparison-matrix"],
            )
            .required()],
        ),
        command(
            "content_clone_template",
            "Clone Template",
            "Clone existing template",
            "template clone",
            "creator.cloneTemplate",
            Content,
            CONTRIBUTORS,
            vec![
                P::string("baseTemplate", "Base template to clone").required(),
                P::string("newName", "New template name").required(),
            ],
        ),
        command(
            "content_mitre_scenario",
            "MITRE-Guided Scenario",
            "Create MITRE-mapped scenario",
            "scenario generate --mitre-guided",
            "creator.mitreGuidedScenario",
            Content,
            CONTRIBUTORS,
            vec![
                P::string("mitreId", "MITRE ATT&CK technique ID"),
                P::enumeration("scenarioType", "Scenario type", SCENARIO_TYPES).required(),
            ],
        ),
        // System
        command(
            "help",
            "Help",
            "Show available commands",
            "help",
            "system.viewCommands",
            System,
            EVERYONE,
            vec![],
        ),
        command(
            "getting_started",
            "Getting Started",
            "Show introduction and guide",
            "getting-started",
            "system.gettingStartedGuide",
            System,
            EVERYONE,
            vec![],
        ),
        command(
            "status_analytics",
            "Refresh Data",
            "Refresh system data and analytics",
            "status --analytics",
            "dashboard.refreshData",
            System,
            EVERYONE,
            vec![],
        ),
    ]
}
