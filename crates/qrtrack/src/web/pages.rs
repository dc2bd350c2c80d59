//! HTML rendering for the web interface.

use std::fmt::Write as _;

use crate::item::Item;

const STYLE: &str = "body{font-family:sans-serif;max-width:48rem;margin:2rem auto;padding:0 1rem}\
table{border-collapse:collapse;width:100%}td,th{border-bottom:1px solid #ddd;padding:.5rem;text-align:left;vertical-align:top}\
.notice{background:#eef6ee;border:1px solid #9c9;padding:.5rem 1rem}\
.error{background:#fbeaea;border:1px solid #c99;padding:.5rem 1rem}\
label{display:block;margin-top:1rem}input,textarea{width:100%}";

/// Banner shown on the listing after a redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// An item was created.
    Created,
    /// An item was edited.
    Updated,
    /// An item was deleted.
    Deleted,
    /// The requested item does not exist.
    NotFound,
}

impl Notice {
    /// Query string value for this notice.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::NotFound => "not-found",
        }
    }

    /// Parse a query string value. Unknown values yield `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(Self::Created),
            "updated" => Some(Self::Updated),
            "deleted" => Some(Self::Deleted),
            "not-found" => Some(Self::NotFound),
            _ => None,
        }
    }

    /// Text shown in the banner.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Created => "Item created.",
            Self::Updated => "Item updated.",
            Self::Deleted => "Item deleted.",
            Self::NotFound => "Item not found.",
        }
    }

    /// Listing URL carrying this notice.
    #[must_use]
    pub fn location(self) -> String {
        format!("/?notice={}", self.as_str())
    }
}

/// Escape text for use in HTML content and quoted attributes.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{body}</body>\n</html>\n",
        escape(title)
    )
}

/// The item listing.
#[must_use]
pub fn index(items: &[Item], notice: Option<Notice>) -> String {
    let mut body = String::from("<h1>Inventory</h1>\n");
    if let Some(notice) = notice {
        let _ = writeln!(body, "<p class=\"notice\">{}</p>", notice.message());
    }
    body.push_str("<p><a href=\"/create\">Add item</a></p>\n");

    if items.is_empty() {
        body.push_str("<p>No items yet.</p>\n");
        return layout("Inventory", &body);
    }

    body.push_str(
        "<table>\n<tr><th>Code</th><th>Title</th><th>Description</th><th>Created</th><th></th></tr>\n",
    );
    for item in items {
        let id = escape(&item.id);
        let _ = writeln!(
            body,
            "<tr><td><img src=\"/qrcodes/{id}.png\" alt=\"code for {title}\" width=\"120\" height=\"120\"></td>\
             <td>{title}</td><td>{description}</td><td>{created}</td>\
             <td><a href=\"/edit/{id}\">Edit</a> <a href=\"/delete_manual/{id}\">Delete</a></td></tr>",
            title = escape(&item.title),
            description = escape(&item.description),
            created = item.created_at_display(),
        );
    }
    body.push_str("</table>\n");
    layout("Inventory", &body)
}

/// Values shown in the create/edit form.
#[derive(Debug, Default)]
pub struct FormPage<'a> {
    /// Item being edited, or `None` for a new item.
    pub item_id: Option<&'a str>,
    /// Title field value.
    pub title: &'a str,
    /// Description field value.
    pub description: &'a str,
    /// Validation message to show above the form.
    pub error: Option<&'a str>,
}

/// The create or edit form.
#[must_use]
pub fn form(page: &FormPage<'_>) -> String {
    let (heading, action, submit) = match page.item_id {
        Some(id) => ("Edit item", format!("/edit/{}", escape(id)), "Save"),
        None => ("Add item", "/create".to_string(), "Create"),
    };

    let mut body = format!("<h1>{heading}</h1>\n");
    if let Some(error) = page.error {
        let _ = writeln!(body, "<p class=\"error\">{}</p>", escape(error));
    }
    let _ = write!(
        body,
        "<form method=\"post\" action=\"{action}\">\n\
         <label for=\"title\">Title</label>\n\
         <input id=\"title\" name=\"title\" value=\"{title}\" required>\n\
         <label for=\"description\">Description</label>\n\
         <textarea id=\"description\" name=\"description\" rows=\"4\">{description}</textarea>\n\
         <p><button type=\"submit\">{submit}</button> <a href=\"/\">Cancel</a></p>\n\
         </form>\n",
        title = escape(page.title),
        description = escape(page.description),
    );
    layout(heading, &body)
}

/// Confirmation shown after a scan deleted an item.
#[must_use]
pub fn scan_deleted(item: &Item) -> String {
    let body = format!(
        "<h1>Item deleted</h1>\n<p>&ldquo;{}&rdquo; has been removed from the inventory.</p>\n\
         <p><a href=\"/\">Back to inventory</a></p>\n",
        escape(&item.title)
    );
    layout("Item deleted", &body)
}

/// Shown when a valid code is scanned for an item that no longer exists.
#[must_use]
pub fn scan_already_gone() -> String {
    layout(
        "Already deleted",
        "<h1>Already deleted</h1>\n<p>This item is no longer in the inventory.</p>\n\
         <p><a href=\"/\">Back to inventory</a></p>\n",
    )
}

/// Shown when a scanned code carries a bad or expired token.
#[must_use]
pub fn scan_rejected() -> String {
    layout(
        "Invalid code",
        "<h1>Invalid or expired code</h1>\n<p>Nothing was deleted.</p>\n\
         <p><a href=\"/\">Back to inventory</a></p>\n",
    )
}

/// Generic failure page. Details go to the log, not the browser.
#[must_use]
pub fn server_error() -> String {
    layout(
        "Error",
        "<h1>Something went wrong</h1>\n<p>The request could not be completed.</p>\n",
    )
}
