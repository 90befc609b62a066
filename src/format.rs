//! Plain-text rendering of Graph JSON resources
//!
//! Every function here is total: missing or mistyped fields fall back to a
//! placeholder instead of failing.

use serde_json::Value;

/// Characters of `bodyPreview` shown in message listings
const PREVIEW_MAX_CHARS: usize = 500;
/// Characters of rendered body shown by `get_email`
const BODY_MAX_CHARS: usize = 20_000;
/// Wrap width for HTML-to-text conversion
const HTML_WRAP_WIDTH: usize = 100;

/// String field or `default`
fn text<'a>(value: &'a Value, key: &str, default: &'a str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or(default)
}

fn flag(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn count(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}

/// `emailAddress.address` of a recipient or sender object
fn address(recipient: &Value) -> &str {
    recipient
        .pointer("/emailAddress/address")
        .and_then(Value::as_str)
        .unwrap_or("")
}

/// Comma-joined addresses of a recipient array field
pub fn address_list(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|recipients| {
            recipients
                .iter()
                .map(address)
                .filter(|a| !a.is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}

pub fn truncate_chars(input: &str, max_chars: usize) -> String {
    input.chars().take(max_chars).collect()
}

/// Full multi-line rendering of a message resource
pub fn format_email(msg: &Value) -> String {
    let mut fields = Vec::new();

    fields.push(format!("📧 Subject: {}", text(msg, "subject", "No Subject")));

    let sender_name = msg
        .pointer("/from/emailAddress/name")
        .and_then(Value::as_str)
        .unwrap_or("N/A");
    let sender_email = msg
        .pointer("/from/emailAddress/address")
        .and_then(Value::as_str)
        .unwrap_or("N/A");
    fields.push(format!("👤 From: {sender_name} <{sender_email}>"));

    let to = address_list(msg, "toRecipients");
    fields.push(format!("📤 To: {}", if to.is_empty() { "N/A" } else { to.as_str() }));

    let cc = address_list(msg, "ccRecipients");
    if !cc.is_empty() {
        fields.push(format!("📧 CC: {cc}"));
    }

    fields.push(format!("📅 Received: {}", text(msg, "receivedDateTime", "N/A")));
    fields.push(format!("📤 Sent: {}", text(msg, "sentDateTime", "N/A")));
    fields.push(format!("⭐ Importance: {}", text(msg, "importance", "normal")));
    fields.push(format!("📎 Has Attachments: {}", flag(msg, "hasAttachments")));
    fields.push(format!("📝 Is Draft: {}", flag(msg, "isDraft")));
    fields.push(format!("📖 Is Read: {}", flag(msg, "isRead")));

    let preview = text(msg, "bodyPreview", "");
    if !preview.is_empty() {
        fields.push(format!(
            "\n📄 Preview:\n{}",
            truncate_chars(preview, PREVIEW_MAX_CHARS)
        ));
    }

    let id = text(msg, "id", "");
    if !id.is_empty() {
        fields.push(format!("\n🔑 ID: {id}"));
    }

    fields.join("\n")
}

/// Message body as plain text, converting HTML bodies
///
/// Returns `None` when the message has no body or the body is blank.
pub fn format_body(msg: &Value) -> Option<String> {
    let body = msg.get("body")?;
    let content = text(body, "content", "");
    if content.trim().is_empty() {
        return None;
    }
    let rendered = if text(body, "contentType", "text").eq_ignore_ascii_case("html") {
        html2text::from_read(content.as_bytes(), HTML_WRAP_WIDTH)
            .unwrap_or_else(|_| content.to_owned())
    } else {
        content.to_owned()
    };
    Some(truncate_chars(rendered.trim(), BODY_MAX_CHARS))
}

/// Compact search hit: read marker, subject, sender, received time
pub fn format_search_hit(msg: &Value) -> String {
    let marker = if flag(msg, "isRead") { "📖" } else { "📕" };
    let from = msg
        .pointer("/from/emailAddress/address")
        .and_then(Value::as_str)
        .unwrap_or("N/A");
    format!(
        "\n{marker} {}\n   From: {from}\n   Received: {}\n   ID: {}",
        text(msg, "subject", "No Subject"),
        text(msg, "receivedDateTime", "N/A"),
        text(msg, "id", "N/A"),
    )
}

pub fn format_draft(msg: &Value) -> String {
    let to = address_list(msg, "toRecipients");
    format!(
        "\n📝 Draft: {}\n   To: {}\n   Created: {}\n   ID: {}",
        text(msg, "subject", "No Subject"),
        if to.is_empty() { "N/A" } else { to.as_str() },
        text(msg, "createdDateTime", "N/A"),
        text(msg, "id", "N/A"),
    )
}

/// Folder with its id and item counts
pub fn format_folder(folder: &Value) -> String {
    format!(
        "\n📁 {}\n   ID: {}\n   Total Items: {}\n   Unread: {}",
        text(folder, "displayName", "N/A"),
        text(folder, "id", "N/A"),
        count(folder, "totalItemCount"),
        count(folder, "unreadItemCount"),
    )
}

/// Folder summary line including subfolder count
pub fn format_folder_counts(folder: &Value) -> String {
    format!(
        "\n📁 {}\n   ID: {}\n   Total: {} | Unread: {} | Subfolders: {}",
        text(folder, "displayName", "N/A"),
        text(folder, "id", "N/A"),
        count(folder, "totalItemCount"),
        count(folder, "unreadItemCount"),
        count(folder, "childFolderCount"),
    )
}

pub fn format_attachment(att: &Value) -> String {
    let kind = text(att, "@odata.type", "unknown");
    format!(
        "\n📎 {}\n   Type: {}\n   Content-Type: {}\n   Size: {} bytes\n   ID: {}",
        text(att, "name", "N/A"),
        kind.trim_start_matches("#microsoft.graph."),
        text(att, "contentType", "N/A"),
        count(att, "size"),
        text(att, "id", "N/A"),
    )
}

/// Items of a Graph collection response (`value` array)
pub fn collection(result: &Value) -> &[Value] {
    result
        .get("value")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Whether Graph reported another page
pub fn has_next_page(result: &Value) -> bool {
    result.get("@odata.nextLink").is_some()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        address_list, collection, format_attachment, format_body, format_email, has_next_page,
        truncate_chars,
    };

    #[test]
    fn formats_full_message() {
        let msg = json!({
            "id": "AAMk1",
            "subject": "Quarterly report",
            "from": { "emailAddress": { "name": "Ada", "address": "ada@contoso.com" } },
            "toRecipients": [
                { "emailAddress": { "address": "bob@contoso.com" } },
                { "emailAddress": { "address": "eve@contoso.com" } }
            ],
            "ccRecipients": [{ "emailAddress": { "address": "cc@contoso.com" } }],
            "isRead": true,
            "bodyPreview": "Numbers attached"
        });
        let out = format_email(&msg);
        assert!(out.contains("📧 Subject: Quarterly report"));
        assert!(out.contains("👤 From: Ada <ada@contoso.com>"));
        assert!(out.contains("📤 To: bob@contoso.com, eve@contoso.com"));
        assert!(out.contains("📧 CC: cc@contoso.com"));
        assert!(out.contains("📖 Is Read: true"));
        assert!(out.contains("Numbers attached"));
        assert!(out.ends_with("🔑 ID: AAMk1"));
    }

    #[test]
    fn missing_fields_render_placeholders() {
        let out = format_email(&json!({}));
        assert!(out.contains("📧 Subject: No Subject"));
        assert!(out.contains("👤 From: N/A <N/A>"));
        assert!(out.contains("📤 To: N/A"));
        assert!(!out.contains("CC:"));
        assert!(!out.contains("ID:"));
    }

    #[test]
    fn html_body_is_converted_to_text() {
        let msg = json!({
            "body": { "contentType": "html", "content": "<p>Hello <b>there</b></p>" }
        });
        let body = format_body(&msg).expect("body");
        assert!(body.contains("Hello"));
        assert!(!body.contains("<p>"));
    }

    #[test]
    fn blank_body_is_none() {
        assert!(format_body(&json!({ "body": { "content": "  " } })).is_none());
        assert!(format_body(&json!({})).is_none());
    }

    #[test]
    fn attachment_type_drops_graph_namespace() {
        let out = format_attachment(&json!({
            "@odata.type": "#microsoft.graph.fileAttachment",
            "name": "a.pdf",
            "size": 42
        }));
        assert!(out.contains("Type: fileAttachment"));
        assert!(out.contains("Size: 42 bytes"));
    }

    #[test]
    fn collection_and_next_page_tolerate_missing_fields() {
        assert!(collection(&json!({})).is_empty());
        assert_eq!(collection(&json!({ "value": [1, 2] })).len(), 2);
        assert!(has_next_page(&json!({ "@odata.nextLink": "https://next" })));
        assert!(!has_next_page(&json!({ "value": [] })));
    }

    #[test]
    fn address_list_skips_empty_entries() {
        let msg = json!({ "toRecipients": [{ "emailAddress": {} }, { "emailAddress": { "address": "x@y.z" } }] });
        assert_eq!(address_list(&msg, "toRecipients"), "x@y.z");
    }

    #[test]
    fn truncates_unicode_by_character() {
        assert_eq!(truncate_chars("a😀b😀c", 4), "a😀b😀");
    }
}
