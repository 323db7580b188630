//! Server-rendered logbook page.
//!
//! The page is a pure function of the entry list it is given. Every piece of
//! stored or submitted text goes through [`escape_for_display`] before it is
//! placed into markup.

use crate::constants::{APP_DESCRIPTION, MAX_BODY_LENGTH, MAX_TITLE_LENGTH};
use crate::entry::Entry;
use crate::validation::escape_for_display;
use std::fmt::Write;

/// Message shown above the entry list.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// An entry was just stored.
    Added(String),
    /// A submission was rejected; one line per problem.
    Rejected(Vec<String>),
    /// Something went wrong on the server side.
    Failure(String),
}

/// Form values to put back into the inputs after a rejected submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormDraft {
    pub title: String,
    pub body: String,
    pub lat: String,
    pub lon: String,
}

/// Renders the full logbook page.
///
/// `entries` are shown in the order given; callers pass the store's
/// newest-first listing.
///
/// # Examples
///
/// ```
/// use logbook::render::{index_page, Notice};
///
/// let page = index_page(&[], Some(&Notice::Added("3".to_string())), None);
/// assert!(page.contains("No entries found."));
/// assert!(page.contains("Entry 3 added."));
/// ```
pub fn index_page(entries: &[Entry], notice: Option<&Notice>, draft: Option<&FormDraft>) -> String {
    let mut html = String::with_capacity(4096);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str("<title>Unit Logbook</title>\n</head>\n<body>\n<main>\n");
    let _ = write!(
        html,
        "<header>\n<h1>Unit Logbook</h1>\n<p>{}</p>\n</header>\n",
        escape_for_display(APP_DESCRIPTION)
    );

    if let Some(notice) = notice {
        html.push_str(&render_notice(notice));
    }

    html.push_str(&render_form(draft.cloned().unwrap_or_default()));
    html.push_str(&render_entries(entries));
    html.push_str("</main>\n</body>\n</html>\n");
    html
}

fn render_notice(notice: &Notice) -> String {
    match notice {
        Notice::Added(id) => format!(
            "<p class=\"notice success\" role=\"status\">Entry {} added.</p>\n",
            escape_for_display(id)
        ),
        Notice::Rejected(messages) => {
            let mut out = String::from("<div class=\"notice error\" role=\"alert\">\n<ul>\n");
            for message in messages {
                let _ = writeln!(out, "<li>{}</li>", escape_for_display(message));
            }
            out.push_str("</ul>\n</div>\n");
            out
        }
        Notice::Failure(message) => format!(
            "<p class=\"notice error\" role=\"alert\">{}</p>\n",
            escape_for_display(message)
        ),
    }
}

fn render_form(draft: FormDraft) -> String {
    format!(
        concat!(
            "<form method=\"post\" action=\"/entries\">\n",
            "<label>Title <input name=\"title\" required maxlength=\"{max_title}\" value=\"{title}\"></label>\n",
            "<label>Body <textarea name=\"body\" required maxlength=\"{max_body}\">{body}</textarea></label>\n",
            "<label>Latitude <input name=\"lat\" inputmode=\"decimal\" value=\"{lat}\"></label>\n",
            "<label>Longitude <input name=\"lon\" inputmode=\"decimal\" value=\"{lon}\"></label>\n",
            "<button type=\"submit\">Add entry</button>\n",
            "</form>\n"
        ),
        max_title = MAX_TITLE_LENGTH,
        max_body = MAX_BODY_LENGTH,
        title = escape_for_display(&draft.title),
        body = escape_for_display(&draft.body),
        lat = escape_for_display(&draft.lat),
        lon = escape_for_display(&draft.lon),
    )
}

fn render_entries(entries: &[Entry]) -> String {
    if entries.is_empty() {
        return "<section id=\"entries\">\n<p>No entries found.</p>\n</section>\n".to_string();
    }

    let mut out = String::from("<section id=\"entries\">\n");
    for entry in entries {
        out.push_str(&render_entry(entry));
    }
    out.push_str("</section>\n");
    out
}

fn render_entry(entry: &Entry) -> String {
    let title = non_empty_or(&entry.title, "No title");
    let body = non_empty_or(&entry.body, "No content");

    let time = if entry.iso_time.trim().is_empty() {
        "<time>No timestamp</time>".to_string()
    } else {
        let escaped = escape_for_display(&entry.iso_time);
        format!("<time datetime=\"{0}\">{0}</time>", escaped)
    };

    let location = match entry.location() {
        Some((lat, lon)) => format!("Location: {}, {}", lat, lon),
        None => "No location data".to_string(),
    };

    format!(
        concat!(
            "<article class=\"entry\" data-id=\"{id}\">\n",
            "<h2>{title}</h2>\n",
            "<p class=\"meta\">{time}</p>\n",
            "<p class=\"body\">{body}</p>\n",
            "<p class=\"location\">{location}</p>\n",
            "</article>\n"
        ),
        id = escape_for_display(&entry.id),
        title = escape_for_display(title),
        time = time,
        body = escape_for_display(body),
        location = escape_for_display(&location),
    )
}

fn non_empty_or<'a>(text: &'a str, fallback: &'a str) -> &'a str {
    if text.trim().is_empty() {
        fallback
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, title: &str, body: &str) -> Entry {
        Entry {
            id: id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            lat: None,
            lon: None,
            iso_time: "2024-05-01T12:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn test_empty_list_message() {
        let page = index_page(&[], None, None);
        assert!(page.contains("No entries found."));
        assert!(page.contains("action=\"/entries\""));
    }

    #[test]
    fn test_markup_in_entries_is_escaped() {
        let page = index_page(
            &[entry("1", "<script>alert(1)</script>", "a & \"b\"")],
            None,
            None,
        );
        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;alert(1)&lt;&#x2F;script&gt;"));
        assert!(page.contains("a &amp; &quot;b&quot;"));
    }

    #[test]
    fn test_missing_fields_use_placeholders() {
        let mut sparse = entry("1", "", "  ");
        sparse.iso_time = String::new();
        let page = index_page(&[sparse], None, None);
        assert!(page.contains("No title"));
        assert!(page.contains("No content"));
        assert!(page.contains("No timestamp"));
        assert!(page.contains("No location data"));
    }

    #[test]
    fn test_location_needs_both_coordinates() {
        let mut full = entry("1", "t", "b");
        full.lat = Some(40.0);
        full.lon = Some(-74.5);
        let mut half = entry("2", "t", "b");
        half.lat = Some(12.0);

        let page = index_page(&[full, half], None, None);
        assert!(page.contains("Location: 40, -74.5"));
        assert_eq!(page.matches("No location data").count(), 1);
    }

    #[test]
    fn test_entries_keep_given_order() {
        let page = index_page(&[entry("9", "newer", "b"), entry("3", "older", "b")], None, None);
        let newer = page.find("newer").unwrap();
        let older = page.find("older").unwrap();
        assert!(newer < older);
    }

    #[test]
    fn test_rejection_notice_and_draft_are_escaped() {
        let notice = Notice::Rejected(vec!["Title must be <200".to_string()]);
        let draft = FormDraft {
            title: "\"><img>".to_string(),
            body: "</textarea>".to_string(),
            ..FormDraft::default()
        };
        let page = index_page(&[], Some(&notice), Some(&draft));
        assert!(page.contains("<li>Title must be &lt;200</li>"));
        assert!(page.contains("value=\"&quot;&gt;&lt;img&gt;\""));
        assert!(page.contains("&lt;&#x2F;textarea&gt;</textarea>"));
    }
}
