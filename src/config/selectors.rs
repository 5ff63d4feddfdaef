// Selector and attribute lists for the message list markup
//
// Each list is ordered: earlier entries win.

use serde::{Deserialize, Serialize};

const POST_VIEW: &str = "[data-testid='postView']";
const USER_POPOVER: &str =
    ".user-popover, [data-testid='post_username'], [data-testid='post-profile-popover']";

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Elements that may be messages
    pub candidate_items: String,
    /// Known message list containers
    pub containers: Vec<String>,
    /// Pane wrappers tried after the known containers
    pub center_panes: Vec<String>,
    /// Any message element, used to find a scrollable ancestor
    pub first_message: String,

    pub id_attributes: Vec<String>,
    /// Namespace prefix the UI puts in front of message ids
    pub id_prefix: String,

    pub author_id_attributes: Vec<String>,
    /// Descendant selectors whose elements may carry an author id
    pub author_id_markers: Vec<String>,
    /// Ancestor levels searched for an author id
    pub ancestor_hops: usize,

    pub author_name_attributes: Vec<String>,
    pub author_name_markers: Vec<String>,
    /// Elements whose text is the display name
    pub author_name_text: Vec<String>,

    pub timestamp_attributes: Vec<String>,
    pub time_elements: Vec<String>,
    /// Enclosing element searched for a time element as a last resort
    pub post_view: String,

    pub thread_attributes: Vec<String>,

    /// Message body selectors, most specific first
    pub text: Vec<String>,
    /// Attribute used as the body when no body element exists
    pub text_label_attribute: String,

    /// Channel title selectors
    pub source_name: Vec<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            candidate_items: r#"[id^="post_"], [data-testid="postView"], [data-post-id]"#.to_string(),
            containers: strings(&[
                "[data-testid='virtualizedPostListContent']",
                "[data-testid='postListContent']",
                POST_VIEW,
                "#post-list",
                ".post-list__dynamic",
                ".post-list__content",
                ".post-list__table",
                ".post-list__body",
                "[class*='PostListContent']",
                "[role='feed']",
                "[role='list']",
                "[aria-label='message list']",
            ]),
            center_panes: strings(&["[data-testid='channelView']", "[class*='CenterPane']"]),
            first_message: "[id^='post_']".to_string(),

            id_attributes: strings(&[
                "id",
                "data-post-id",
                "data-postid",
                "data-message-id",
                "data-messageid",
            ]),
            id_prefix: "post_".to_string(),

            author_id_attributes: strings(&["data-userid", "data-user-id"]),
            author_id_markers: strings(&[
                "[data-user-id], [data-userid]",
                "[data-testid='postProfilePicture'] img, [data-testid='postProfilePicture']",
                USER_POPOVER,
            ]),
            ancestor_hops: 4,

            author_name_attributes: strings(&["data-username", "data-user-name"]),
            author_name_markers: strings(&["[data-username]", USER_POPOVER]),
            author_name_text: strings(&[
                "[data-testid='postProfilePicture'] + div .user-popover",
                "[data-testid='postProfilePicture'] + div [data-testid='post_username']",
            ]),

            timestamp_attributes: strings(&[
                "data-create-at",
                "data-createat",
                "data-timestamp",
                "data-message-timestamp",
            ]),
            time_elements: strings(&["time[datetime]", "time"]),
            post_view: POST_VIEW.to_string(),

            thread_attributes: strings(&[
                "data-root-id",
                "data-rootid",
                "data-root-post-id",
                "data-rootpostid",
                "data-thread-id",
                "data-threadid",
            ]),

            text: strings(&[
                "[data-testid='postMessageText']",
                ".post-message__text",
                ".post-message",
            ]),
            text_label_attribute: "aria-label".to_string(),

            source_name: strings(&[
                "[data-testid='channelHeaderTitle']",
                "#channelHeaderTitle",
                ".channel-header__title",
                ".channel-header__name",
                "[data-testid='channelHeaderTitleText']",
                "h1",
            ]),
        }
    }
}
