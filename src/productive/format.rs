//! Record → display item formatting, one formatter per resource kind.

use serde_json::{Map, Value};

use super::resources::ResourceKind;
use super::types::{DisplayItem, Record};

const APP_URL: &str = "https://app.productive.io";

pub type Formatter = fn(&Record, &FormatContext) -> DisplayItem;

/// Values formatters need besides the record itself.
#[derive(Debug, Clone, Default)]
pub struct FormatContext {
  pub org_id: String,
}

impl FormatContext {
  fn url(&self, path: &str) -> String {
    format!("{}/{}/{}", APP_URL, self.org_id, path)
  }
}

impl ResourceKind {
  pub fn formatter(self) -> Formatter {
    match self {
      Self::Companies => format_company,
      Self::Deals => format_deal,
      Self::People => format_person,
      Self::Projects => format_project,
      Self::Services => format_service,
      Self::Tasks => format_task,
    }
  }
}

// ============================================================================
// Formatters
// ============================================================================

fn format_task(task: &Record, ctx: &FormatContext) -> DisplayItem {
  let project = task.related("project");
  let company = project.and_then(|p| p.related("company"));
  let assignee = task.related("assignee");
  let status = task.related("workflow_status");

  // only a complete CODE-PROJECT-TASK key is shown
  let task_key = [
    company.and_then(|c| c.attr_text("company_code")),
    project.and_then(|p| p.attr_text("project_number")),
    task.attr_text("task_number"),
  ]
  .into_iter()
  .collect::<Option<Vec<_>>>()
  .map(|parts| parts.join("-"));

  let url = ctx.url(&format!("task/{}", task.id));
  let subtitle = format_subtitle([
    task_key.clone(),
    company.and_then(|c| c.attr_text("name")),
    project.and_then(|p| p.attr_text("name")),
    status.and_then(|s| s.attr_text("name")),
    assignee.map(format_name).filter(|n| !n.is_empty()),
    Some(format!(
      "{} / {}",
      format_minutes(task.attr_i64("worked_time")),
      format_minutes(task.attr_i64("initial_estimate"))
    )),
  ]);

  let mut variables = Map::new();
  variables.insert("task_url".into(), url.clone().into());
  variables.insert("task_name".into(), opt(task.attr_text("title")));
  variables.insert("task_id".into(), task.id.clone().into());
  variables.insert("task_key".into(), opt(task_key));
  variables.insert("project_id".into(), opt(project.map(|p| p.id.clone())));
  variables.insert("company_id".into(), opt(company.map(|c| c.id.clone())));
  variables.insert("assignee_id".into(), opt(assignee.map(|a| a.id.clone())));
  variables.insert("status_id".into(), opt(status.map(|s| s.id.clone())));
  insert_record_data(&mut variables, task);

  build_item(task, task.attr_text("title"), subtitle, url, variables)
}

fn format_project(project: &Record, ctx: &FormatContext) -> DisplayItem {
  let company = project.related("company");

  let subtitle = format_subtitle([
    company.and_then(|c| c.attr_text("company_code")),
    company.and_then(|c| c.attr_text("name")),
  ]);

  let mut variables = Map::new();
  variables.insert("project_id".into(), project.id.clone().into());
  variables.insert("company_id".into(), opt(company.map(|c| c.id.clone())));
  insert_record_data(&mut variables, project);

  build_item(
    project,
    project.attr_text("name"),
    subtitle,
    ctx.url(&format!("projects/{}", project.id)),
    variables,
  )
}

fn format_deal(deal: &Record, ctx: &FormatContext) -> DisplayItem {
  let company = deal.related("company");
  let responsible = deal.related("responsible");
  let deal_status = deal.related("deal_status");

  let sales_status = match deal.attr_i64("sales_status_id").unwrap_or(3) {
    1 => Some("Open"),
    2 => Some("Won"),
    3 => Some("Lost"),
    _ => None,
  };

  let subtitle = format_subtitle([
    company.and_then(|c| c.attr_text("company_code")),
    company.and_then(|c| c.attr_text("name")),
    responsible.map(format_name).filter(|n| !n.is_empty()),
    sales_status.map(String::from),
    deal_status.and_then(|s| s.attr_text("name")),
  ]);

  let mut variables = Map::new();
  variables.insert("deal_id".into(), deal.id.clone().into());
  variables.insert("company_id".into(), opt(company.map(|c| c.id.clone())));
  insert_record_data(&mut variables, deal);

  build_item(
    deal,
    deal.attr_text("name"),
    subtitle,
    ctx.url(&format!("d/deal/{}", deal.id)),
    variables,
  )
}

fn format_company(company: &Record, ctx: &FormatContext) -> DisplayItem {
  let subtitle = format_subtitle([company.attr_text("company_code"), company.attr_text("name")]);

  let mut variables = Map::new();
  variables.insert("attributes".into(), Value::Object(company.attributes.clone()));

  build_item(
    company,
    company.attr_text("name"),
    subtitle,
    ctx.url(&format!("companies/{}", company.id)),
    variables,
  )
}

fn format_service(service: &Record, ctx: &FormatContext) -> DisplayItem {
  let deal = service.related("deal");
  let company = deal.and_then(|d| d.related("company"));

  let deal_name = deal.and_then(|d| {
    let name = d.attr_text("name")?;
    Some(match d.attr_text("suffix") {
      Some(suffix) => format!("{} ({})", name, suffix),
      None => name,
    })
  });
  let deal_state = deal.map(|d| if d.is_null_attr("closed_at") { "Open" } else { "Closed" });

  let subtitle = format_subtitle([
    company.and_then(|c| c.attr_text("company_code")),
    company.and_then(|c| c.attr_text("name")),
    deal_name,
    deal_state.map(String::from),
    Some(format!(
      "{} / {}",
      format_minutes(service.attr_i64("worked_time")),
      format_minutes(service.attr_i64("budgeted_time"))
    )),
    Some(format!(
      "{} / {}",
      format_cents(service.attr_i64("budget_used")),
      format_cents(service.attr_i64("budget_total"))
    )),
  ]);

  let deal_id = deal.map(|d| d.id.clone());
  let mut variables = Map::new();
  variables.insert("service_name".into(), opt(service.attr_text("name")));
  variables.insert(
    "company_name".into(),
    opt(company.and_then(|c| c.attr_text("name"))),
  );
  variables.insert("service_id".into(), service.id.clone().into());
  variables.insert("deal_id".into(), opt(deal_id.clone()));
  variables.insert("company_id".into(), opt(company.map(|c| c.id.clone())));
  insert_record_data(&mut variables, service);

  build_item(
    service,
    service.attr_text("name"),
    subtitle,
    ctx.url(&format!("d/deal/{}/services", deal_id.unwrap_or_default())),
    variables,
  )
}

fn format_person(person: &Record, ctx: &FormatContext) -> DisplayItem {
  let company = person.related("company");

  let title = [person.attr_text("first_name"), person.attr_text("last_name")]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ");

  let subtitle = format_subtitle([
    company.and_then(|c| c.attr_text("name")),
    person.attr_text("title"),
    person.attr_text("email"),
  ]);

  let mut variables = Map::new();
  insert_record_data(&mut variables, person);

  build_item(
    person,
    Some(title),
    subtitle,
    ctx.url(&format!("people/{}", person.id)),
    variables,
  )
}

// ============================================================================
// Helpers
// ============================================================================

fn build_item(
  record: &Record,
  title: Option<String>,
  subtitle: String,
  arg: String,
  variables: Map<String, Value>,
) -> DisplayItem {
  let title = title.unwrap_or_default();
  DisplayItem {
    match_text: format_match(&record.id, &title, &subtitle),
    title,
    subtitle,
    uid: record.id.clone(),
    arg,
    variables,
  }
}

fn opt(value: Option<String>) -> Value {
  value.map(Value::String).unwrap_or(Value::Null)
}

/// Expose relationships and attributes so readers can filter on them.
fn insert_record_data(variables: &mut Map<String, Value>, record: &Record) {
  variables.insert(
    "relationships".into(),
    serde_json::to_value(&record.relationships).unwrap_or(Value::Null),
  );
  variables.insert("attributes".into(), Value::Object(record.attributes.clone()));
}

/// `1 h`, `05 min`, `1 h 05 min`, or `...` when unknown.
pub fn format_minutes(minutes: Option<i64>) -> String {
  let Some(minutes) = minutes else {
    return "...".to_string();
  };

  let hours = minutes / 60;
  let mins = minutes % 60;

  if mins == 0 {
    format!("{} h", hours)
  } else if hours < 1 {
    format!("{:02} min", mins)
  } else {
    format!("{} h {:02} min", hours, mins)
  }
}

/// `12.5 €` from 1250 cents, or `...` when unknown.
pub fn format_cents(cents: Option<i64>) -> String {
  match cents {
    None => "...".to_string(),
    Some(cents) if cents % 100 == 0 => format!("{} €", cents / 100),
    Some(cents) => format!("{} €", cents as f64 / 100.0),
  }
}

/// `First L.`, or whichever half of the name exists.
pub fn format_name(person: &Record) -> String {
  let first = person.attr_text("first_name");
  let last = person.attr_text("last_name");

  match (first, last) {
    (Some(first), Some(last)) => {
      let initial: String = last.chars().take(1).flat_map(char::to_uppercase).collect();
      format!("{} {}.", first, initial)
    }
    (None, Some(last)) => last,
    (Some(first), None) => first,
    (None, None) => String::new(),
  }
}

pub fn format_subtitle<const N: usize>(parts: [Option<String>; N]) -> String {
  parts
    .into_iter()
    .flatten()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(" → ")
}

/// Search text: uid, title and subtitle with `(`, `)` and `/` blanked out.
pub fn format_match(uid: &str, title: &str, subtitle: &str) -> String {
  format!("{} {} {}", uid, title, subtitle).replace(['(', ')', '/'], " ")
}
