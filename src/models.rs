//! Tool input types
//!
//! MCP clients pass every tool parameter as a string, including booleans and
//! counts (`top = "25"`, `reply_all = "true"`). Fields default to the same
//! values a client would get by omitting them; coercion and required-field
//! checks happen in the handlers.

use schemars::JsonSchema;
use serde::Deserialize;

/// Fields requested when listing messages
pub const LIST_SELECT_FIELDS: &str = "id,subject,from,toRecipients,ccRecipients,receivedDateTime,sentDateTime,importance,hasAttachments,isDraft,isRead,bodyPreview";
/// Fields requested when fetching a single message
pub const DETAIL_SELECT_FIELDS: &str = "id,subject,from,toRecipients,ccRecipients,bccRecipients,receivedDateTime,sentDateTime,importance,hasAttachments,isDraft,isRead,body,bodyPreview,replyTo,internetMessageHeaders";

/// Input: list messages in the mailbox or one folder
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ReadEmailsInput {
    /// Folder id or well-known name (e.g. `inbox`); empty lists all messages
    pub folder_id: String,
    /// OData `$filter` expression
    pub filter_str: String,
    /// Free-text search (KQL); disables ordering and skip
    pub search: String,
    /// Comma-separated `$select` fields
    pub select_fields: String,
    /// OData `$orderby` expression
    pub order_by: String,
    /// Page size (1..1000)
    pub top: String,
    /// Messages to skip
    pub skip: String,
}

impl Default for ReadEmailsInput {
    fn default() -> Self {
        Self {
            folder_id: String::new(),
            filter_str: String::new(),
            search: String::new(),
            select_fields: LIST_SELECT_FIELDS.to_owned(),
            order_by: "receivedDateTime DESC".to_owned(),
            top: default_top(),
            skip: "0".to_owned(),
        }
    }
}

/// Input: fetch one message
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GetEmailInput {
    /// Graph message id
    pub message_id: String,
    /// Comma-separated `$select` fields
    pub select_fields: String,
}

impl Default for GetEmailInput {
    fn default() -> Self {
        Self {
            message_id: String::new(),
            select_fields: DETAIL_SELECT_FIELDS.to_owned(),
        }
    }
}

/// Message fields shared by `create_draft` and `send_email`
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ComposeFields {
    pub subject: String,
    pub body: String,
    /// `text` or `html`
    pub body_type: String,
    /// Comma-separated addresses
    pub to_recipients: String,
    /// Comma-separated addresses
    pub cc_recipients: String,
    /// Comma-separated addresses
    pub bcc_recipients: String,
    /// `low`, `normal` or `high`
    pub importance: String,
}

impl Default for ComposeFields {
    fn default() -> Self {
        Self {
            subject: String::new(),
            body: String::new(),
            body_type: "text".to_owned(),
            to_recipients: String::new(),
            cc_recipients: String::new(),
            bcc_recipients: String::new(),
            importance: "normal".to_owned(),
        }
    }
}

/// Input: create a draft
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct CreateDraftInput {
    #[serde(flatten)]
    pub message: ComposeFields,
}

/// Input: send a new message
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SendEmailInput {
    #[serde(flatten)]
    pub message: ComposeFields,
    /// Keep a copy in Sent Items (`true`/`false`)
    #[serde(default = "default_true_str")]
    pub save_to_sent: String,
}

/// Input: operations addressed by message id only
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MessageIdInput {
    /// Graph message id
    pub message_id: String,
}

/// Input: forward a message
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ForwardEmailInput {
    pub message_id: String,
    /// Comma-separated addresses
    pub to_recipients: String,
    /// Text placed above the forwarded message
    pub comment: String,
}

/// Input: reply, or create a draft reply
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ReplyEmailInput {
    pub message_id: String,
    /// Reply text
    pub body: String,
    /// Reply to all recipients (`true`/`false`)
    pub reply_all: String,
}

impl Default for ReplyEmailInput {
    fn default() -> Self {
        Self {
            message_id: String::new(),
            body: String::new(),
            reply_all: "false".to_owned(),
        }
    }
}

/// Input: create a draft forward
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DraftForwardInput {
    pub message_id: String,
    /// Text placed above the forwarded message
    pub body: String,
}

/// Input: move or copy a message
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TransferEmailInput {
    pub message_id: String,
    /// Destination folder id or well-known name
    pub destination_folder_id: String,
}

/// Input: update message properties; blank fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct UpdateEmailInput {
    pub message_id: String,
    /// `true`/`false`
    pub is_read: String,
    /// `true`/`false`
    pub is_flagged: String,
    /// `low`, `normal` or `high`
    pub importance: String,
    pub subject: String,
}

/// Input: attach a file to a draft
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AddAttachmentInput {
    pub message_id: String,
    pub file_name: String,
    /// Base64-encoded file content
    pub content_bytes: String,
}

/// Input: folder listing with a page size
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GetMailFoldersInput {
    /// Page size (1..1000)
    pub top: String,
}

impl Default for GetMailFoldersInput {
    fn default() -> Self {
        Self {
            top: "100".to_owned(),
        }
    }
}

/// Input: search by free text and/or OData filter
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SearchEmailsInput {
    /// Free-text search (KQL)
    pub query: String,
    /// OData `$filter` expression
    pub filter_str: String,
    /// Page size (1..1000)
    pub top: String,
}

impl Default for SearchEmailsInput {
    fn default() -> Self {
        Self {
            query: String::new(),
            filter_str: String::new(),
            top: default_top(),
        }
    }
}

/// Input: page size only
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TopInput {
    /// Page size (1..1000)
    pub top: String,
}

impl Default for TopInput {
    fn default() -> Self {
        Self { top: default_top() }
    }
}

fn default_top() -> String {
    "25".to_owned()
}

fn default_true_str() -> String {
    "true".to_owned()
}
