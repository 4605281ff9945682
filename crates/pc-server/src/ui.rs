use pc_core::core::{
    BatchProgress, CompleteView, Notice, NoticeLevel, ResponseLimits, ReviewView, View, ViewModel,
};

/// Static values the setup form is pre-filled with.
#[derive(Clone, Debug)]
pub struct UiDefaults {
    pub initial_user_prompt: String,
    pub limits: ResponseLimits,
    pub output_file: String,
}

const INLINE_CSS: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; background: #f6f7f9; color: #1d1f23; }
.container { max-width: 1100px; margin: 0 auto; padding: 24px; }
h1 { font-size: 1.5rem; margin-bottom: 4px; }
.subtitle { color: #5c6370; margin-top: 0; }
.card { background: #fff; border: 1px solid #dde1e6; border-radius: 8px; padding: 16px; margin-bottom: 16px; }
.notice { padding: 8px 12px; border-radius: 6px; margin-bottom: 8px; }
.notice-info { background: #e7f3ff; }
.notice-warning { background: #fff4d6; }
.notice-error { background: #fde2e1; }
textarea { width: 100%; box-sizing: border-box; font-family: inherit; font-size: 0.95rem; }
.context { white-space: pre-wrap; background: #f0f2f5; padding: 8px; border-radius: 6px; }
.slot { border-top: 1px solid #eceff3; padding-top: 12px; margin-top: 12px; }
.actions button { margin-right: 8px; }
pre.dataset { max-height: 400px; overflow: auto; background: #272b33; color: #e6e6e6; padding: 12px; border-radius: 6px; }
"#;

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn notice_class(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Info => "notice-info",
        NoticeLevel::Warning => "notice-warning",
        NoticeLevel::Error => "notice-error",
    }
}

// ---------------------------------------------------------------------------
// Page rendering
// ---------------------------------------------------------------------------

pub fn render_page(model: &ViewModel, notices: &[Notice], defaults: &UiDefaults) -> String {
    let mut html = String::with_capacity(8192);
    push_head(&mut html, None);
    push_notices(&mut html, notices);

    match &model.view {
        View::Setup => push_setup(&mut html, defaults),
        View::Review(review) => push_review(&mut html, review),
        View::Complete(complete) => push_complete(&mut html, complete, defaults),
    }

    html.push_str("<div class=\"card\">\n<h2>Collected pairs</h2>\n");
    let preview = serde_json::to_string_pretty(&model.dataset).unwrap_or_default();
    html.push_str(&format!(
        "<pre class=\"dataset\" id=\"dataset\">{}</pre>\n</div>\n",
        escape_html(&preview)
    ));

    push_tail(&mut html);
    html
}

/// Shown while a batch holds the session; refreshes itself until it ends.
pub fn render_busy_page(progress: BatchProgress) -> String {
    let mut html = String::with_capacity(2048);
    push_head(&mut html, Some(2));
    html.push_str("<div class=\"card\">\n<h2>Generating responses</h2>\n");
    if progress.total > 0 {
        html.push_str(&format!(
            "<p id=\"progress\">Completed {} of {} groups.</p>\n",
            progress.completed, progress.total
        ));
        html.push_str(&format!(
            "<progress value=\"{}\" max=\"{}\"></progress>\n",
            progress.completed, progress.total
        ));
    } else {
        html.push_str("<p id=\"progress\">Working...</p>\n");
    }
    html.push_str("</div>\n");
    push_tail(&mut html);
    html
}

fn push_head(html: &mut String, refresh_secs: Option<u32>) {
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"UTF-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    if let Some(secs) = refresh_secs {
        html.push_str(&format!("<meta http-equiv=\"refresh\" content=\"{secs}\">\n"));
    }
    html.push_str("<title>Preference Pair Curation</title>\n<style>\n");
    html.push_str(INLINE_CSS);
    html.push_str("</style>\n</head>\n<body>\n<div class=\"container\">\n");
    html.push_str("<h1>Preference Pair Curation</h1>\n");
    html.push_str("<p class=\"subtitle\">Generate responses per system prompt, pick the best ones, collect DPO pairs.</p>\n");
}

fn push_tail(html: &mut String) {
    html.push_str("</div>\n</body>\n</html>\n");
}

fn push_notices(html: &mut String, notices: &[Notice]) {
    for notice in notices {
        html.push_str(&format!(
            "<div class=\"notice {}\">{}</div>\n",
            notice_class(notice.level),
            escape_html(&notice.message)
        ));
    }
}

fn push_setup(html: &mut String, defaults: &UiDefaults) {
    let limits = defaults.limits;
    html.push_str("<div class=\"card\">\n<h2>New batch</h2>\n");
    html.push_str("<form method=\"post\" action=\"/start\">\n");
    html.push_str("<label for=\"user_prompt\">User prompt</label>\n");
    html.push_str(&format!(
        "<textarea id=\"user_prompt\" name=\"user_prompt\" rows=\"5\">\n{}</textarea>\n",
        escape_html(&defaults.initial_user_prompt)
    ));
    html.push_str(&format!(
        "<p><label for=\"num_responses\">Responses per system prompt</label>\n\
         <input type=\"number\" id=\"num_responses\" name=\"num_responses\" min=\"{}\" max=\"{}\" value=\"{}\"></p>\n",
        limits.default.min(2),
        limits.max,
        limits.default
    ));
    html.push_str("<div class=\"actions\"><button type=\"submit\">Generate</button></div>\n");
    html.push_str("</form>\n</div>\n");

    html.push_str("<div class=\"card\">\n<h2>Resume</h2>\n");
    html.push_str("<form method=\"post\" action=\"/resume\">\n");
    html.push_str("<div class=\"actions\"><button type=\"submit\">Resume previous session</button></div>\n");
    html.push_str("</form>\n</div>\n");
}

fn push_review(html: &mut String, review: &ReviewView) {
    html.push_str("<div class=\"card\">\n");
    html.push_str(&format!(
        "<h2 id=\"review-progress\">{}</h2>\n",
        escape_html(&review.progress_text)
    ));
    html.push_str("<h3>System prompt</h3>\n");
    html.push_str(&format!(
        "<div class=\"context\">{}</div>\n",
        escape_html(&review.system)
    ));
    html.push_str("<h3>User prompt</h3>\n");
    html.push_str(&format!(
        "<div class=\"context\">{}</div>\n",
        escape_html(&review.user)
    ));
    html.push_str("</div>\n");

    html.push_str("<form method=\"post\" action=\"/confirm\" class=\"card\">\n");
    html.push_str(&format!(
        "<input type=\"hidden\" name=\"cursor\" value=\"{}\">\n",
        review.cursor
    ));
    for slot in &review.slots {
        html.push_str("<div class=\"slot\">\n");
        html.push_str(&format!(
            "<label><input type=\"checkbox\" name=\"chosen_{i}\" value=\"on\"> {label} is a best answer</label>\n",
            i = slot.index,
            label = escape_html(&slot.label)
        ));
        html.push_str(&format!(
            "<textarea name=\"response_{}\" rows=\"8\">\n{}</textarea>\n",
            slot.index,
            escape_html(&slot.text)
        ));
        html.push_str("</div>\n");
    }
    html.push_str("<div class=\"actions\">\n");
    html.push_str("<button type=\"submit\">Confirm and next</button>\n");
    html.push_str("<button type=\"submit\" formaction=\"/skip\">Skip group</button>\n");
    html.push_str("<button type=\"submit\" formaction=\"/regenerate\">Regenerate responses</button>\n");
    html.push_str("</div>\n</form>\n");
}

fn push_complete(html: &mut String, complete: &CompleteView, defaults: &UiDefaults) {
    html.push_str("<div class=\"card\">\n<h2>Round complete</h2>\n");
    html.push_str(&format!(
        "<p id=\"summary\">Reviewed {} groups and collected {} pairs. Records were appended to {}.</p>\n",
        complete.groups_reviewed,
        complete.pairs_collected,
        escape_html(&defaults.output_file)
    ));
    html.push_str("<form method=\"post\" action=\"/new-round\">\n");
    html.push_str("<div class=\"actions\"><button type=\"submit\">Start a new round</button></div>\n");
    html.push_str("</form>\n</div>\n");
}
