//! Stage templates and the shared HTML layout.
//!
//! Each template turns [`Vars`] into a [`Content`]; [`layout`] wraps it with
//! the call-to-action button and the unsubscribe footer every message carries.

use crate::format::escape_html as h;

/// Values available to every template. Raw text; templates escape what they
/// place into HTML.
pub(crate) struct Vars<'a> {
  pub name:            &'a str,
  pub specialty:       &'a str,
  pub region:          String,
  pub gap:             String,
  pub report_url:      String,
  pub unsubscribe_url: String,
}

/// Template output before layout. `paragraphs` hold ready-to-embed HTML.
pub(crate) struct Content {
  pub subject:    String,
  pub heading:    String,
  pub paragraphs: Vec<String>,
  pub cta_label:  &'static str,
}

pub(crate) type Template = fn(&Vars<'_>) -> Content;

/// All known template keys, in default sequence order.
pub(crate) const TEMPLATES: &[(&str, Template)] = &[
  ("gap-report", gap_report),
  ("peer-benchmark", peer_benchmark),
  ("recovery-playbook", recovery_playbook),
  ("case-study", case_study),
  ("final-reminder", final_reminder),
];

pub(crate) fn lookup(key: &str) -> Option<Template> {
  TEMPLATES.iter().find(|(k, _)| *k == key).map(|(_, t)| *t)
}

// ─── Templates ───────────────────────────────────────────────────────────────

fn gap_report(v: &Vars<'_>) -> Content {
  Content {
    subject:    format!("{}, your practice may be missing {} a year", v.name, v.gap),
    heading:    format!("Your {} revenue scan is ready", h(v.specialty)),
    paragraphs: vec![
      format!("Hi {},", h(v.name)),
      format!(
        "Our scan of public claims data puts the estimated annual revenue gap \
         for your practice at <strong>{}</strong>.",
        h(&v.gap)
      ),
      "The full report breaks the gap down by service line and payer mix."
        .to_owned(),
    ],
    cta_label:  "View your report",
  }
}

fn peer_benchmark(v: &Vars<'_>) -> Content {
  Content {
    subject:    format!("How {} practices in {} compare", v.specialty, v.region),
    heading:    format!("{} benchmarks for {}", h(v.specialty), h(&v.region)),
    paragraphs: vec![
      format!("Hi {},", h(v.name)),
      format!(
        "We compared your practice against {} peers in {}. Practices in the \
         top quartile capture most of the {} your scan flagged.",
        h(v.specialty),
        h(&v.region),
        h(&v.gap)
      ),
    ],
    cta_label:  "See the benchmark",
  }
}

fn recovery_playbook(v: &Vars<'_>) -> Content {
  Content {
    subject:    format!("3 ways to recover {} this year", v.gap),
    heading:    "Your recovery playbook".to_owned(),
    paragraphs: vec![
      format!("Hi {},", h(v.name)),
      format!(
        "Most {} practices close their gap with three changes: coding \
         review, eligibility checks before every visit, and follow-up on \
         underpaid claims.",
        h(v.specialty)
      ),
      format!("Applied to your numbers, that is up to {} back.", h(&v.gap)),
    ],
    cta_label:  "Open the playbook",
  }
}

fn case_study(v: &Vars<'_>) -> Content {
  Content {
    subject:    format!("How a {} practice closed its revenue gap", v.specialty),
    heading:    "A practice like yours".to_owned(),
    paragraphs: vec![
      format!("Hi {},", h(v.name)),
      format!(
        "A {} group in {} started with a gap close to yours. Within two \
         quarters they had recovered most of it without adding staff.",
        h(v.specialty),
        h(&v.region)
      ),
    ],
    cta_label:  "Compare with your scan",
  }
}

fn final_reminder(v: &Vars<'_>) -> Content {
  Content {
    subject:    format!("Last note about your {} revenue scan", v.gap),
    heading:    "Your report is still waiting".to_owned(),
    paragraphs: vec![
      format!("Hi {},", h(v.name)),
      format!(
        "This is the last message in this series. Your scan and its {} \
         estimate stay available at the link below.",
        h(&v.gap)
      ),
    ],
    cta_label:  "View your report",
  }
}

// ─── Layout ──────────────────────────────────────────────────────────────────

pub(crate) fn layout(content: &Content, vars: &Vars<'_>) -> String {
  let mut html = String::new();
  html.push_str("<!DOCTYPE html>\n<html><body style=\"font-family:sans-serif\">\n");
  html.push_str(&format!("<h1>{}</h1>\n", content.heading));
  for p in &content.paragraphs {
    html.push_str(&format!("<p>{p}</p>\n"));
  }
  html.push_str(&format!(
    "<p><a href=\"{}\" style=\"padding:10px 16px;background:#0b5;color:#fff;\
     text-decoration:none\">{}</a></p>\n",
    h(&vars.report_url),
    content.cta_label
  ));
  html.push_str(&format!(
    "<hr>\n<p style=\"font-size:12px;color:#777\">You are receiving this \
     because a revenue scan was requested for your practice. \
     <a href=\"{}\">Unsubscribe</a></p>\n",
    h(&vars.unsubscribe_url)
  ));
  html.push_str("</body></html>\n");
  html
}
