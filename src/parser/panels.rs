//! Profiler panels: config, router, request, search results and phpinfo.

use csv::ReaderBuilder;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;

/// A request logged by the profiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub token: String,
    pub ip: String,
    pub method: String,
    pub url: String,
    pub time: String,
    pub status: String,
}

/// Routing panel of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterPanel {
    pub matched: Option<String>,
    /// Every route compared against the request: (name, path).
    pub routes: Vec<(String, String)>,
}

/// What the request panel tells about a logged request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestPanel {
    /// Decoded body parameters.
    pub parameters: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
    /// Serialized security token of the session, if any.
    pub session: Option<String>,
}

/// Session attribute holding the security token of the main firewall.
const SECURITY_ATTRIBUTE: &str = "_security_main";

/// Parser for the HTML panels of the profiler.
#[derive(Clone)]
pub struct PanelParser {
    value: Selector,
    h2: Selector,
    h3: Selector,
    pre: Selector,
    table: Selector,
    tbody: Selector,
    row: Selector,
    header: Selector,
    cell: Selector,
    span: Selector,
    router_logs: Selector,
    search_results: Selector,
    php_key: Selector,
    php_value: Selector,
    role: Regex,
}

impl PanelParser {
    pub fn new() -> Self {
        Self {
            value: Selector::parse("span.value").unwrap(),
            h2: Selector::parse("h2").unwrap(),
            h3: Selector::parse("h3").unwrap(),
            pre: Selector::parse("pre").unwrap(),
            table: Selector::parse("table").unwrap(),
            tbody: Selector::parse("tbody").unwrap(),
            row: Selector::parse("tr").unwrap(),
            header: Selector::parse("th").unwrap(),
            cell: Selector::parse("td").unwrap(),
            span: Selector::parse("span").unwrap(),
            router_logs: Selector::parse("table#router-logs").unwrap(),
            search_results: Selector::parse("table#search-results").unwrap(),
            php_key: Selector::parse("td.e").unwrap(),
            php_value: Selector::parse("td.v").unwrap(),
            role: Regex::new(r#"ROLE_[^"']+"#).unwrap(),
        }
    }

    /// Value of a labelled metric, e.g. "Symfony version" on the config panel.
    ///
    /// Newer profilers render `<span class="value">` before its
    /// `<span class="label">`, older ones a `<th>label</th><td>value</td>` row.
    pub fn metric(&self, html: &str, label: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let elements = elements(&document);
        self.metric_in(&elements, label)
    }

    fn metric_in(&self, elements: &[ElementRef<'_>], label: &str) -> Option<String> {
        let position = elements
            .iter()
            .position(|e| collapse(&own_text(e)) == label)?;

        let value = elements[..position]
            .iter()
            .rev()
            .find(|e| self.value.matches(e))
            .or_else(|| elements[position + 1..].iter().find(|e| self.cell.matches(e)))?;

        let value = text(value);
        (!value.is_empty()).then_some(value)
    }

    /// Routing panel: matched route and the routes compared with the request.
    pub fn router(&self, html: &str) -> Option<RouterPanel> {
        let document = Html::parse_document(html);
        let table = document.select(&self.router_logs).next()?;

        let routes = table
            .select(&self.row)
            .filter_map(|row| {
                let cells: Vec<String> = row.select(&self.cell).map(|c| text(&c)).collect();
                match cells.as_slice() {
                    [_, name, path, ..] => Some((name.clone(), path.clone())),
                    _ => None,
                }
            })
            .collect();

        let matched = self
            .metric_in(&elements(&document), "Matched route")
            .filter(|route| route != "(none)");

        Some(RouterPanel { matched, routes })
    }

    /// Entries of the profiler search page. `None` when the page has no
    /// result table at all.
    pub fn search_results(&self, html: &str) -> Option<Vec<LogEntry>> {
        if html.contains("No results found") {
            return Some(Vec::new());
        }
        let document = Html::parse_document(html);
        let table = document.select(&self.search_results).next()?;

        let entries = table
            .select(&self.row)
            .filter_map(|row| {
                let cells: Vec<String> = row.select(&self.cell).map(|c| text(&c)).collect();
                match cells.as_slice() {
                    [status, ip, method, url, time, token, ..] => Some(LogEntry {
                        token: token.clone(),
                        ip: ip.clone(),
                        method: method.clone(),
                        url: url.clone(),
                        time: time.clone(),
                        status: status.clone(),
                    }),
                    _ => None,
                }
            })
            .collect();

        Some(entries)
    }

    /// Request panel of one logged request. `None` when the page has no
    /// "Request Content" section.
    pub fn request(&self, html: &str) -> Option<RequestPanel> {
        let document = Html::parse_document(html);
        let elements = elements(&document);

        let content = after_heading(&elements, &self.h3, "Request Content")?;
        let raw = content
            .iter()
            .find(|e| self.pre.matches(e))
            .map(trimmed)
            .unwrap_or_default();

        let mut parameters: Vec<(String, String)> = Vec::new();
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            let key = key.trim().to_string();
            let value = value.trim().to_string();
            // Repeated keys are joined like the profiler displays them.
            match parameters.iter_mut().find(|(k, _)| *k == key) {
                Some((_, existing)) => {
                    existing.push_str(", ");
                    existing.push_str(&value);
                }
                None => parameters.push((key, value)),
            }
        }

        let cookies = self.key_values(&elements, "Request Cookies");
        let session = self
            .key_values(&elements, "Session Attributes")
            .into_iter()
            .find(|(k, _)| k == SECURITY_ATTRIBUTE)
            .map(|(_, v)| v);

        Some(RequestPanel {
            parameters,
            cookies,
            session,
        })
    }

    /// First `ROLE_*` name in a serialized session.
    pub fn role(&self, session: &str) -> Option<String> {
        self.role.find(session).map(|m| m.as_str().to_string())
    }

    /// Rows of the "PHP Variables" table of phpinfo(), keyed like
    /// `$_ENV['APP_ENV']`. `None` when the table is missing.
    pub fn php_variables(&self, html: &str) -> Option<BTreeMap<String, String>> {
        let document = Html::parse_document(html);
        let elements = elements(&document);
        let table = after_heading(&elements, &self.h2, "PHP Variables")?
            .iter()
            .find(|e| self.table.matches(e))?;

        let mut variables = BTreeMap::new();
        for row in table.select(&self.row) {
            let key = row.select(&self.php_key).next();
            let value = row.select(&self.php_value).next();
            if let (Some(key), Some(value)) = (key, value) {
                variables.insert(trimmed(&key), trimmed(&value));
            }
        }
        Some(variables)
    }

    /// `<th>key</th><td>value</td>` rows of the table below an `<h3>` title.
    ///
    /// Values are dumped by the VarDumper: the text sits in the first
    /// `<span>` of the cell, next to quotes and an `Sfdump()` script.
    fn key_values(&self, elements: &[ElementRef<'_>], title: &str) -> Vec<(String, String)> {
        let Some(body) = after_heading(elements, &self.h3, title)
            .and_then(|rest| rest.iter().find(|e| self.tbody.matches(e)))
        else {
            return Vec::new();
        };

        body.select(&self.row)
            .filter_map(|row| {
                let key = row.select(&self.header).next()?;
                let cell = row.select(&self.cell).next()?;
                let value = cell
                    .select(&self.span)
                    .next()
                    .or_else(|| cell.select(&self.pre).next())
                    .unwrap_or(cell);
                Some((text(&key), trimmed(&value)))
            })
            .collect()
    }
}

impl Default for PanelParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Every element of a document, in document order.
fn elements(document: &Html) -> Vec<ElementRef<'_>> {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect()
}

/// Elements following the first heading titled `title`.
fn after_heading<'a, 'b>(
    elements: &'b [ElementRef<'a>],
    heading: &Selector,
    title: &str,
) -> Option<&'b [ElementRef<'a>]> {
    let position = elements
        .iter()
        .position(|e| heading.matches(e) && text(e) == title)?;
    Some(&elements[position + 1..])
}

/// Text directly inside an element, children elements left out.
fn own_text(element: &ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|node| node.value().as_text())
        .map(|t| &**t)
        .collect()
}

/// Whitespace-collapsed text content.
fn text(element: &ElementRef<'_>) -> String {
    collapse(&element.text().collect::<String>())
}

fn trimmed(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse the profiler's `index.csv`
/// (`token,ip,method,url,time,parent,status` per line). Short lines are
/// skipped.
pub fn parse_index(index: &str) -> Vec<LogEntry> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(index.as_bytes());

    let entries = reader
        .records()
        .filter_map(|record| record.ok())
        .filter(|record| record.len() >= 7)
        .map(|record| LogEntry {
            token: record[0].to_string(),
            ip: record[1].to_string(),
            method: record[2].to_string(),
            url: record[3].to_string(),
            time: record[4].to_string(),
            status: record[6].to_string(),
        })
        .collect();
    entries
}
