//! MCP server implementation with tool handlers
//!
//! Implements the `ServerHandler` trait and registers the mailbox tools. Each
//! tool validates and coerces its string parameters, issues Graph calls
//! through the shared [`GraphClient`], and renders the result as text.
//! Failures are logged here and returned to the client as an error line.

use std::sync::{Arc, LazyLock};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{ServerCapabilities, ServerInfo};
use rmcp::{ServerHandler, tool, tool_handler, tool_router};
use serde_json::{Map, Value, json};
use tracing::error;

use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult};
use crate::format;
use crate::graph::GraphClient;
use crate::models::{
    AddAttachmentInput, ComposeFields, CreateDraftInput, DraftForwardInput, ForwardEmailInput,
    GetEmailInput, GetMailFoldersInput, MessageIdInput, ReadEmailsInput, ReplyEmailInput,
    SearchEmailsInput, SendEmailInput, TopInput, TransferEmailInput, UpdateEmailInput,
};

/// Largest `$top` Graph accepts for message and folder collections
const MAX_PAGE_SIZE: u32 = 1000;
/// Fields requested by `search_emails`
const SEARCH_SELECT_FIELDS: &str =
    "id,subject,from,toRecipients,receivedDateTime,importance,hasAttachments,isRead";
/// Fields requested by `get_unread_emails`
const UNREAD_SELECT_FIELDS: &str =
    "id,subject,from,toRecipients,receivedDateTime,importance,hasAttachments";
/// Fields requested by `get_draft_emails`
const DRAFT_SELECT_FIELDS: &str = "id,subject,toRecipients,ccRecipients,createdDateTime";
/// Fields requested by `get_mail_folders`
const FOLDER_SELECT_FIELDS: &str = "id,displayName,totalItemCount,unreadItemCount,childFolderCount";

static ADDRESS_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[^@\s,;<>]+@[^@\s,;<>]+\.[^@\s,;<>]+$"));

/// Outlook mailbox MCP server
///
/// Holds the configuration and the Graph dispatcher (which owns the shared
/// token cache). Cloned per request by the MCP runtime; clones share state.
#[derive(Clone)]
pub struct GraphMailServer {
    /// Server config (endpoints, mailbox owner)
    config: Arc<ServerConfig>,
    /// Authenticated Graph dispatcher
    graph: GraphClient,
    /// Tool router for dispatching MCP tool calls
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl GraphMailServer {
    /// Create a new MCP server instance
    pub fn new(config: Arc<ServerConfig>, graph: GraphClient) -> Self {
        Self {
            config,
            graph,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "List emails from inbox or specified folder with filtering options")]
    async fn read_emails(&self, Parameters(input): Parameters<ReadEmailsInput>) -> String {
        finalize_tool("read_emails", self.read_emails_impl(input).await)
    }

    #[tool(description = "Get a specific email by ID with full details")]
    async fn get_email(&self, Parameters(input): Parameters<GetEmailInput>) -> String {
        finalize_tool("get_email", self.get_email_impl(input).await)
    }

    #[tool(description = "Create a new email draft")]
    async fn create_draft(&self, Parameters(input): Parameters<CreateDraftInput>) -> String {
        finalize_tool("create_draft", self.create_draft_impl(input).await)
    }

    #[tool(description = "Send an email directly")]
    async fn send_email(&self, Parameters(input): Parameters<SendEmailInput>) -> String {
        finalize_tool("send_email", self.send_email_impl(input).await)
    }

    #[tool(description = "Send an existing draft by ID")]
    async fn send_draft(&self, Parameters(input): Parameters<MessageIdInput>) -> String {
        finalize_tool("send_draft", self.send_draft_impl(input).await)
    }

    #[tool(description = "Forward an existing email")]
    async fn forward_email(&self, Parameters(input): Parameters<ForwardEmailInput>) -> String {
        finalize_tool("forward_email", self.forward_email_impl(input).await)
    }

    #[tool(description = "Reply to an email")]
    async fn reply_email(&self, Parameters(input): Parameters<ReplyEmailInput>) -> String {
        finalize_tool("reply_email", self.reply_email_impl(input).await)
    }

    #[tool(description = "Create a draft reply to an email")]
    async fn create_draft_reply(&self, Parameters(input): Parameters<ReplyEmailInput>) -> String {
        finalize_tool(
            "create_draft_reply",
            self.create_draft_reply_impl(input).await,
        )
    }

    #[tool(description = "Create a draft forward of an email")]
    async fn create_draft_forward(
        &self,
        Parameters(input): Parameters<DraftForwardInput>,
    ) -> String {
        finalize_tool(
            "create_draft_forward",
            self.create_draft_forward_impl(input).await,
        )
    }

    #[tool(description = "Delete an email (moves to deleted items)")]
    async fn delete_email(&self, Parameters(input): Parameters<MessageIdInput>) -> String {
        finalize_tool("delete_email", self.delete_email_impl(input).await)
    }

    #[tool(description = "Permanently delete an email")]
    async fn permanent_delete_email(
        &self,
        Parameters(input): Parameters<MessageIdInput>,
    ) -> String {
        finalize_tool(
            "permanent_delete_email",
            self.permanent_delete_email_impl(input).await,
        )
    }

    #[tool(description = "Move an email to a different folder")]
    async fn move_email(&self, Parameters(input): Parameters<TransferEmailInput>) -> String {
        finalize_tool(
            "move_email",
            self.transfer_email_impl(input, Transfer::Move).await,
        )
    }

    #[tool(description = "Copy an email to a different folder")]
    async fn copy_email(&self, Parameters(input): Parameters<TransferEmailInput>) -> String {
        finalize_tool(
            "copy_email",
            self.transfer_email_impl(input, Transfer::Copy).await,
        )
    }

    #[tool(description = "Update email properties (read status, flag, importance, subject)")]
    async fn update_email(&self, Parameters(input): Parameters<UpdateEmailInput>) -> String {
        finalize_tool("update_email", self.update_email_impl(input).await)
    }

    #[tool(description = "List all email folders in the mailbox")]
    async fn list_folders(&self) -> String {
        finalize_tool("list_folders", self.list_folders_impl().await)
    }

    #[tool(description = "List all attachments for an email")]
    async fn list_attachments(&self, Parameters(input): Parameters<MessageIdInput>) -> String {
        finalize_tool("list_attachments", self.list_attachments_impl(input).await)
    }

    #[tool(description = "Add an attachment to an email draft")]
    async fn add_attachment(&self, Parameters(input): Parameters<AddAttachmentInput>) -> String {
        finalize_tool("add_attachment", self.add_attachment_impl(input).await)
    }

    #[tool(description = "Get top mail folders with item counts")]
    async fn get_mail_folders(
        &self,
        Parameters(input): Parameters<GetMailFoldersInput>,
    ) -> String {
        finalize_tool("get_mail_folders", self.get_mail_folders_impl(input).await)
    }

    #[tool(description = "Search emails using Microsoft Search or OData filters")]
    async fn search_emails(&self, Parameters(input): Parameters<SearchEmailsInput>) -> String {
        finalize_tool("search_emails", self.search_emails_impl(input).await)
    }

    #[tool(description = "Get all unread emails from inbox")]
    async fn get_unread_emails(&self, Parameters(input): Parameters<TopInput>) -> String {
        finalize_tool("get_unread_emails", self.get_unread_emails_impl(input).await)
    }

    #[tool(description = "Get all draft emails")]
    async fn get_draft_emails(&self, Parameters(input): Parameters<TopInput>) -> String {
        finalize_tool("get_draft_emails", self.get_draft_emails_impl(input).await)
    }

    #[tool(description = "Mark an email as read")]
    async fn mark_as_read(&self, Parameters(input): Parameters<MessageIdInput>) -> String {
        finalize_tool("mark_as_read", self.set_read_impl(input, true).await)
    }

    #[tool(description = "Mark an email as unread")]
    async fn mark_as_unread(&self, Parameters(input): Parameters<MessageIdInput>) -> String {
        finalize_tool("mark_as_unread", self.set_read_impl(input, false).await)
    }
}

/// MCP server handler implementation
///
/// Provides server info and capabilities to MCP client.
#[tool_handler(router = self.tool_router)]
impl ServerHandler for GraphMailServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build()).with_instructions(
            "Outlook mailbox tools backed by Microsoft Graph. Requires TENANT_ID, CLIENT_ID and CLIENT_SECRET for an app registration with Mail permissions.",
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum Transfer {
    Move,
    Copy,
}

/// Tool implementation methods
///
/// Private methods hold the business logic; the `#[tool]` methods above only
/// turn their results into text.
impl GraphMailServer {
    /// `{root}/messages/{id}` with the id percent-encoded
    fn message_path(&self, message_id: &str) -> String {
        format!(
            "{}/messages/{}",
            self.config.mailbox_root(),
            urlencoding::encode(message_id)
        )
    }

    fn messages_path(&self) -> String {
        format!("{}/messages", self.config.mailbox_root())
    }

    fn folders_path(&self) -> String {
        format!("{}/mailFolders", self.config.mailbox_root())
    }

    async fn read_emails_impl(&self, input: ReadEmailsInput) -> AppResult<String> {
        let top = parse_count(&input.top, "top", 1, MAX_PAGE_SIZE)?;
        let skip = parse_count(&input.skip, "skip", 0, u32::MAX)?;

        let endpoint = match non_empty(&input.folder_id) {
            Some(folder_id) => {
                validate_graph_id(folder_id, "folder_id")?;
                format!(
                    "{}/{}/messages",
                    self.folders_path(),
                    urlencoding::encode(folder_id)
                )
            }
            None => self.messages_path(),
        };

        let searching = non_empty(&input.search).is_some();
        if searching && skip > 0 {
            return Err(AppError::invalid("skip cannot be combined with search"));
        }

        let mut query = vec![("$top", top.to_string())];
        match non_empty(&input.search) {
            // Graph rejects $orderby and $skip alongside $search
            Some(search) => query.push(("$search", quote_search(search))),
            None => {
                query.push(("$skip", skip.to_string()));
                if let Some(order_by) = non_empty(&input.order_by) {
                    query.push(("$orderby", order_by.to_owned()));
                }
            }
        }
        if let Some(filter) = non_empty(&input.filter_str) {
            query.push(("$filter", filter.to_owned()));
        }
        if let Some(select) = non_empty(&input.select_fields) {
            query.push(("$select", select.to_owned()));
        }

        let result = self.graph.get(&endpoint, &query).await?;
        let messages = format::collection(&result);
        if messages.is_empty() {
            return Ok("✅ No emails found".to_owned());
        }

        let mut output = vec![format!("📬 Found {} emails:\n", messages.len())];
        for (i, msg) in messages.iter().enumerate() {
            output.push(format!("\n--- Email {} ---", i + 1));
            output.push(format::format_email(msg));
        }
        if format::has_next_page(&result) {
            let notice = if searching {
                "\n\n⚠️ More emails available. Narrow the search or raise top to see them."
            } else {
                "\n\n⚠️ More emails available. Use skip parameter to paginate."
            };
            output.push(notice.to_owned());
        }
        Ok(output.join("\n"))
    }

    async fn get_email_impl(&self, input: GetEmailInput) -> AppResult<String> {
        let message_id = require_id(&input.message_id, "message_id")?;
        let mut query = Vec::new();
        if let Some(select) = non_empty(&input.select_fields) {
            query.push(("$select", select.to_owned()));
        }

        let result = self
            .graph
            .get(&self.message_path(message_id), &query)
            .await?;
        let mut output = format!("📧 Email Details:\n\n{}", format::format_email(&result));
        if let Some(body) = format::format_body(&result) {
            output.push_str("\n\n📄 Body:\n");
            output.push_str(&body);
        }
        Ok(output)
    }

    async fn create_draft_impl(&self, input: CreateDraftInput) -> AppResult<String> {
        let message = build_message(&input.message)?;
        let result = self.graph.post(&self.messages_path(), &message).await?;
        Ok(format!(
            "✅ Draft created successfully!\n\n📧 Draft ID: {}\n📝 Subject: {}\n📤 To: {}",
            result.get("id").and_then(Value::as_str).unwrap_or("N/A"),
            input.message.subject,
            input.message.to_recipients
        ))
    }

    async fn send_email_impl(&self, input: SendEmailInput) -> AppResult<String> {
        if parse_recipients(&input.message.to_recipients, "to_recipients")?.is_empty() {
            return Err(AppError::invalid("At least one recipient is required"));
        }
        let save_to_sent = parse_bool_param(&input.save_to_sent, "save_to_sent", true)?;
        let message = build_message(&input.message)?;

        let payload = json!({ "message": message, "saveToSentItems": save_to_sent });
        self.graph
            .post(&format!("{}/sendMail", self.config.mailbox_root()), &payload)
            .await?;
        Ok(format!(
            "✅ Email sent successfully!\n\n📝 Subject: {}\n📤 To: {}",
            input.message.subject, input.message.to_recipients
        ))
    }

    async fn send_draft_impl(&self, input: MessageIdInput) -> AppResult<String> {
        let message_id = require_id(&input.message_id, "message_id")?;
        self.graph
            .post(&format!("{}/send", self.message_path(message_id)), &json!({}))
            .await?;
        Ok(format!(
            "✅ Draft sent successfully!\n\n📧 Message ID: {message_id}"
        ))
    }

    async fn forward_email_impl(&self, input: ForwardEmailInput) -> AppResult<String> {
        let message_id = require_id(&input.message_id, "message_id")?;
        let recipients = parse_recipients(&input.to_recipients, "to_recipients")?;
        if recipients.is_empty() {
            return Err(AppError::invalid("At least one recipient is required"));
        }

        let mut payload = Map::new();
        payload.insert("toRecipients".to_owned(), Value::Array(recipients));
        if let Some(comment) = non_empty(&input.comment) {
            payload.insert("comment".to_owned(), Value::String(comment.to_owned()));
        }

        self.graph
            .post(
                &format!("{}/forward", self.message_path(message_id)),
                &Value::Object(payload),
            )
            .await?;
        Ok(format!(
            "✅ Email forwarded successfully!\n\n📧 Original Message ID: {message_id}\n📤 Forwarded to: {}",
            input.to_recipients
        ))
    }

    async fn reply_email_impl(&self, input: ReplyEmailInput) -> AppResult<String> {
        let message_id = require_id(&input.message_id, "message_id")?;
        let reply_all = parse_bool_param(&input.reply_all, "reply_all", false)?;
        let action = if reply_all { "replyAll" } else { "reply" };

        self.graph
            .post(
                &format!("{}/{action}", self.message_path(message_id)),
                &reply_payload(&input.body),
            )
            .await?;
        let reply_type = if reply_all { "reply-all" } else { "reply" };
        Ok(format!(
            "✅ Email {reply_type} sent successfully!\n\n📧 Original Message ID: {message_id}"
        ))
    }

    async fn create_draft_reply_impl(&self, input: ReplyEmailInput) -> AppResult<String> {
        let message_id = require_id(&input.message_id, "message_id")?;
        let reply_all = parse_bool_param(&input.reply_all, "reply_all", false)?;
        let action = if reply_all {
            "createReplyAll"
        } else {
            "createReply"
        };

        let result = self
            .graph
            .post(
                &format!("{}/{action}", self.message_path(message_id)),
                &reply_payload(&input.body),
            )
            .await?;
        Ok(format!(
            "✅ Draft reply created!\n\n📧 Draft ID: {}\n📧 Original Message ID: {message_id}",
            result.get("id").and_then(Value::as_str).unwrap_or("N/A")
        ))
    }

    async fn create_draft_forward_impl(&self, input: DraftForwardInput) -> AppResult<String> {
        let message_id = require_id(&input.message_id, "message_id")?;
        let result = self
            .graph
            .post(
                &format!("{}/createForward", self.message_path(message_id)),
                &reply_payload(&input.body),
            )
            .await?;
        Ok(format!(
            "✅ Draft forward created!\n\n📧 Draft ID: {}\n📧 Original Message ID: {message_id}",
            result.get("id").and_then(Value::as_str).unwrap_or("N/A")
        ))
    }

    async fn delete_email_impl(&self, input: MessageIdInput) -> AppResult<String> {
        let message_id = require_id(&input.message_id, "message_id")?;
        self.graph.delete(&self.message_path(message_id)).await?;
        Ok(format!(
            "✅ Email deleted successfully!\n\n📧 Message ID: {message_id}"
        ))
    }

    async fn permanent_delete_email_impl(&self, input: MessageIdInput) -> AppResult<String> {
        let message_id = require_id(&input.message_id, "message_id")?;
        self.graph
            .post(
                &format!("{}/permanentDelete", self.message_path(message_id)),
                &json!({}),
            )
            .await?;
        Ok(format!(
            "✅ Email permanently deleted!\n\n📧 Message ID: {message_id}"
        ))
    }

    async fn transfer_email_impl(
        &self,
        input: TransferEmailInput,
        transfer: Transfer,
    ) -> AppResult<String> {
        let message_id = require_id(&input.message_id, "message_id")?;
        let destination = require_id(&input.destination_folder_id, "destination_folder_id")?;
        let (action, done, new_label) = match transfer {
            Transfer::Move => ("move", "moved", "New ID"),
            Transfer::Copy => ("copy", "copied", "Copy ID"),
        };

        let result = self
            .graph
            .post(
                &format!("{}/{action}", self.message_path(message_id)),
                &json!({ "destinationId": destination }),
            )
            .await?;
        Ok(format!(
            "✅ Email {done} successfully!\n\n📧 Original ID: {message_id}\n📁 {new_label}: {}\n📁 Destination Folder: {destination}",
            result.get("id").and_then(Value::as_str).unwrap_or("N/A")
        ))
    }

    async fn update_email_impl(&self, input: UpdateEmailInput) -> AppResult<String> {
        let message_id = require_id(&input.message_id, "message_id")?;
        let update = build_update(&input)?;
        if update.is_empty() {
            return Err(AppError::invalid("No properties to update"));
        }

        let update = Value::Object(update);
        self.graph
            .patch(&self.message_path(message_id), &update)
            .await?;
        let rendered = serde_json::to_string_pretty(&update).unwrap_or_else(|_| update.to_string());
        Ok(format!(
            "✅ Email updated successfully!\n\n📧 Message ID: {message_id}\n📝 Updates: {rendered}"
        ))
    }

    async fn list_folders_impl(&self) -> AppResult<String> {
        let result = self.graph.get(&self.folders_path(), &[]).await?;
        let folders = format::collection(&result);
        if folders.is_empty() {
            return Ok("✅ No folders found".to_owned());
        }

        let mut output = vec![format!("📁 Found {} folders:\n", folders.len())];
        output.extend(folders.iter().map(format::format_folder));
        Ok(output.join("\n"))
    }

    async fn list_attachments_impl(&self, input: MessageIdInput) -> AppResult<String> {
        let message_id = require_id(&input.message_id, "message_id")?;
        let result = self
            .graph
            .get(
                &format!("{}/attachments", self.message_path(message_id)),
                &[],
            )
            .await?;
        let attachments = format::collection(&result);
        if attachments.is_empty() {
            return Ok("✅ No attachments found".to_owned());
        }

        let mut output = vec![format!("📎 Found {} attachments:\n", attachments.len())];
        output.extend(attachments.iter().map(format::format_attachment));
        Ok(output.join("\n"))
    }

    async fn add_attachment_impl(&self, input: AddAttachmentInput) -> AppResult<String> {
        let message_id = require_id(&input.message_id, "message_id")?;
        let file_name = require(&input.file_name, "file_name")?;
        let content_bytes = require(&input.content_bytes, "content_bytes")?;
        let decoded_len = STANDARD
            .decode(content_bytes)
            .map_err(|e| AppError::invalid(format!("content_bytes is not valid base64: {e}")))?
            .len();

        let attachment = json!({
            "@odata.type": "#microsoft.graph.fileAttachment",
            "name": file_name,
            "contentBytes": content_bytes,
        });
        let result = self
            .graph
            .post(
                &format!("{}/attachments", self.message_path(message_id)),
                &attachment,
            )
            .await?;
        Ok(format!(
            "✅ Attachment added!\n\n📎 Attachment ID: {}\n📄 File name: {file_name}\n📦 Size: {decoded_len} bytes",
            result.get("id").and_then(Value::as_str).unwrap_or("N/A")
        ))
    }

    async fn get_mail_folders_impl(&self, input: GetMailFoldersInput) -> AppResult<String> {
        let top = parse_count(&input.top, "top", 1, MAX_PAGE_SIZE)?;
        let query = [
            ("$top", top.to_string()),
            ("$select", FOLDER_SELECT_FIELDS.to_owned()),
        ];
        let result = self.graph.get(&self.folders_path(), &query).await?;
        let folders = format::collection(&result);
        if folders.is_empty() {
            return Ok("✅ No folders found".to_owned());
        }

        let mut output = vec!["📁 Mail Folders:\n".to_owned()];
        output.extend(folders.iter().map(format::format_folder_counts));
        Ok(output.join("\n"))
    }

    async fn search_emails_impl(&self, input: SearchEmailsInput) -> AppResult<String> {
        let search = non_empty(&input.query);
        let filter = non_empty(&input.filter_str);
        if search.is_none() && filter.is_none() {
            return Err(AppError::invalid("Either query or filter_str is required"));
        }
        let top = parse_count(&input.top, "top", 1, MAX_PAGE_SIZE)?;

        let mut query = vec![
            ("$top", top.to_string()),
            ("$select", SEARCH_SELECT_FIELDS.to_owned()),
        ];
        if let Some(search) = search {
            query.push(("$search", quote_search(search)));
        }
        if let Some(filter) = filter {
            query.push(("$filter", filter.to_owned()));
        }

        let result = self.graph.get(&self.messages_path(), &query).await?;
        let messages = format::collection(&result);
        if messages.is_empty() {
            return Ok("✅ No emails found matching criteria".to_owned());
        }

        let mut output = vec![format!("🔍 Found {} emails:\n", messages.len())];
        output.extend(messages.iter().map(format::format_search_hit));
        Ok(output.join("\n"))
    }

    async fn get_unread_emails_impl(&self, input: TopInput) -> AppResult<String> {
        let top = parse_count(&input.top, "top", 1, MAX_PAGE_SIZE)?;
        let query = [
            ("$filter", "isRead eq false".to_owned()),
            ("$top", top.to_string()),
            ("$orderby", "receivedDateTime DESC".to_owned()),
            ("$select", UNREAD_SELECT_FIELDS.to_owned()),
        ];
        let result = self.graph.get(&self.messages_path(), &query).await?;
        let messages = format::collection(&result);
        if messages.is_empty() {
            return Ok("✅ No unread emails".to_owned());
        }

        let mut output = vec![format!("📕 Found {} unread emails:\n", messages.len())];
        for msg in messages {
            output.push("\n--- Unread Email ---".to_owned());
            output.push(format::format_email(msg));
        }
        Ok(output.join("\n"))
    }

    async fn get_draft_emails_impl(&self, input: TopInput) -> AppResult<String> {
        let top = parse_count(&input.top, "top", 1, MAX_PAGE_SIZE)?;
        let query = [
            ("$filter", "isDraft eq true".to_owned()),
            ("$top", top.to_string()),
            ("$orderby", "createdDateTime DESC".to_owned()),
            ("$select", DRAFT_SELECT_FIELDS.to_owned()),
        ];
        let result = self.graph.get(&self.messages_path(), &query).await?;
        let messages = format::collection(&result);
        if messages.is_empty() {
            return Ok("✅ No draft emails found".to_owned());
        }

        let mut output = vec![format!("📝 Found {} draft emails:\n", messages.len())];
        output.extend(messages.iter().map(format::format_draft));
        Ok(output.join("\n"))
    }

    async fn set_read_impl(&self, input: MessageIdInput, is_read: bool) -> AppResult<String> {
        let message_id = require_id(&input.message_id, "message_id")?;
        self.graph
            .patch(&self.message_path(message_id), &json!({ "isRead": is_read }))
            .await?;
        let state = if is_read { "read" } else { "unread" };
        Ok(format!(
            "✅ Email marked as {state}!\n\n📧 Message ID: {message_id}"
        ))
    }
}

/// Turn a tool result into the text returned to the client
///
/// Errors are logged with the tool name and rendered as a single error line.
fn finalize_tool(tool: &str, result: AppResult<String>) -> String {
    match result {
        Ok(text) => text,
        Err(e) => {
            let status = match &e {
                AppError::Graph(graph) => graph.status(),
                AppError::InvalidInput(_) => None,
            };
            error!(tool, ?status, "tool failed: {e}");
            format!("❌ Error: {e}")
        }
    }
}

/// Trimmed value, or `None` if blank
fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Require a non-blank parameter
fn require<'a>(value: &'a str, field: &str) -> AppResult<&'a str> {
    non_empty(value).ok_or_else(|| AppError::invalid(format!("{field} is required")))
}

/// Require a non-blank Graph resource id
fn require_id<'a>(value: &'a str, field: &str) -> AppResult<&'a str> {
    let id = require(value, field)?;
    validate_graph_id(id, field)?;
    Ok(id)
}

/// Reject ids that could not have come from Graph
fn validate_graph_id(id: &str, field: &str) -> AppResult<()> {
    if id.len() > 512 {
        return Err(AppError::invalid(format!(
            "{field} must be at most 512 characters"
        )));
    }
    if id.chars().any(|ch| ch.is_ascii_control()) {
        return Err(AppError::invalid(format!(
            "{field} must not contain control characters"
        )));
    }
    Ok(())
}

/// Parse a string-typed count within `min..=max`
fn parse_count(value: &str, field: &str, min: u32, max: u32) -> AppResult<u32> {
    let parsed = value
        .trim()
        .parse::<u32>()
        .map_err(|_| AppError::invalid(format!("{field} must be an integer, got '{value}'")))?;
    if parsed < min || parsed > max {
        return Err(AppError::invalid(format!(
            "{field} must be in range {min}..{max}"
        )));
    }
    Ok(parsed)
}

/// Parse a string-typed boolean; blank means `default`
fn parse_bool_param(value: &str, field: &str, default: bool) -> AppResult<bool> {
    if value.trim().is_empty() {
        return Ok(default);
    }
    parse_bool_value(value)
        .ok_or_else(|| AppError::invalid(format!("{field} must be true or false, got '{value}'")))
}

fn parse_bool_value(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Wrap a KQL search term in double quotes, as Graph's `$search` expects
fn quote_search(term: &str) -> String {
    format!("\"{}\"", term.replace('"', ""))
}

/// Comma-separated addresses as Graph recipient objects
fn parse_recipients(list: &str, field: &str) -> AppResult<Vec<Value>> {
    let pattern = ADDRESS_PATTERN
        .as_ref()
        .map_err(|e| AppError::invalid(format!("invalid address regex: {e}")))?;
    list.split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(|addr| {
            if pattern.is_match(addr) {
                Ok(json!({ "emailAddress": { "address": addr } }))
            } else {
                Err(AppError::invalid(format!(
                    "{field} contains invalid address '{addr}'"
                )))
            }
        })
        .collect()
}

fn validate_body_type(value: &str) -> AppResult<String> {
    let lowered = value.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "text" | "html" => Ok(lowered),
        _ => Err(AppError::invalid(format!(
            "body_type must be text or html, got '{value}'"
        ))),
    }
}

fn validate_importance(value: &str) -> AppResult<String> {
    let lowered = value.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "low" | "normal" | "high" => Ok(lowered),
        _ => Err(AppError::invalid(format!(
            "importance must be low, normal or high, got '{value}'"
        ))),
    }
}

/// Graph message resource for drafts and sends
fn build_message(fields: &ComposeFields) -> AppResult<Value> {
    if non_empty(&fields.subject).is_none() && non_empty(&fields.body).is_none() {
        return Err(AppError::invalid("Subject or body is required"));
    }

    let mut message = Map::new();
    message.insert("subject".to_owned(), Value::String(fields.subject.clone()));
    message.insert(
        "importance".to_owned(),
        Value::String(validate_importance(&fields.importance)?),
    );
    message.insert(
        "body".to_owned(),
        json!({
            "contentType": validate_body_type(&fields.body_type)?,
            "content": fields.body,
        }),
    );

    for (key, list, field) in [
        ("toRecipients", &fields.to_recipients, "to_recipients"),
        ("ccRecipients", &fields.cc_recipients, "cc_recipients"),
        ("bccRecipients", &fields.bcc_recipients, "bcc_recipients"),
    ] {
        let recipients = parse_recipients(list, field)?;
        if !recipients.is_empty() {
            message.insert(key.to_owned(), Value::Array(recipients));
        }
    }

    Ok(Value::Object(message))
}

/// Optional comment body for reply/forward actions
fn reply_payload(body: &str) -> Value {
    match non_empty(body) {
        Some(_) => json!({ "message": { "body": { "contentType": "text", "content": body } } }),
        None => json!({}),
    }
}

/// PATCH body for `update_email`; empty when nothing was requested
fn build_update(input: &UpdateEmailInput) -> AppResult<Map<String, Value>> {
    let mut update = Map::new();
    if non_empty(&input.is_read).is_some() {
        update.insert(
            "isRead".to_owned(),
            Value::Bool(parse_bool_param(&input.is_read, "is_read", false)?),
        );
    }
    if non_empty(&input.is_flagged).is_some() {
        let flagged = parse_bool_param(&input.is_flagged, "is_flagged", false)?;
        let status = if flagged { "flagged" } else { "notFlagged" };
        update.insert("flag".to_owned(), json!({ "flagStatus": status }));
    }
    if non_empty(&input.importance).is_some() {
        update.insert(
            "importance".to_owned(),
            Value::String(validate_importance(&input.importance)?),
        );
    }
    if let Some(subject) = non_empty(&input.subject) {
        update.insert("subject".to_owned(), Value::String(subject.to_owned()));
    }
    Ok(update)
}
