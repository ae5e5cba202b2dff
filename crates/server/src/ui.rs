//! Single-page web UI
//!
//! The page posts the text to `/api/speech`, plays the returned WAV inline
//! and offers the same bytes as a download.

use tts_demo_config::constants::{audio, ui};

const PAGE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{{TITLE}}</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 720px; margin: 3rem auto; padding: 0 1rem; color: #262730; }
  textarea { width: 100%; min-height: 8rem; font: inherit; padding: .5rem; box-sizing: border-box; }
  button { margin-top: .75rem; padding: .5rem 1rem; font: inherit; cursor: pointer; }
  button:disabled { cursor: progress; opacity: .6; }
  .status { margin-top: 1rem; padding: .75rem 1rem; border-radius: .5rem; display: none; }
  .status.progress { display: block; background: #f0f2f6; }
  .status.success { display: block; background: #dff5e3; color: #1b5e20; }
  .status.warning { display: block; background: #fff8e1; color: #8a6d00; }
  .status.error { display: block; background: #fdecea; color: #a4262c; }
  #result { margin-top: 1rem; display: none; }
  #result audio { width: 100%; }
  #download { display: inline-block; margin-top: .5rem; }
</style>
</head>
<body>
<h1>{{TITLE}}</h1>
<label for="text">{{INPUT_LABEL}}</label>
<textarea id="text">{{DEFAULT_TEXT}}</textarea>
<button id="generate">{{BUTTON_LABEL}}</button>
<div id="status" class="status"></div>
<div id="result">
  <audio id="player" controls></audio>
  <a id="download" href="#">{{DOWNLOAD_LABEL}}</a>
</div>
<script>
const MESSAGES = {{MESSAGES}};
const button = document.getElementById("generate");
const statusBox = document.getElementById("status");
const result = document.getElementById("result");
const player = document.getElementById("player");
const download = document.getElementById("download");
let objectUrl = null;

function showStatus(kind, text) {
  statusBox.className = "status " + kind;
  statusBox.textContent = text;
}

function wavBlob(base64, mime) {
  const raw = atob(base64);
  const bytes = new Uint8Array(raw.length);
  for (let i = 0; i < raw.length; i++) bytes[i] = raw.charCodeAt(i);
  return new Blob([bytes], { type: mime });
}

button.addEventListener("click", async () => {
  const text = document.getElementById("text").value;
  if (text.trim() === "") {
    result.style.display = "none";
    showStatus("warning", MESSAGES.warning);
    return;
  }
  button.disabled = true;
  result.style.display = "none";
  showStatus("progress", MESSAGES.progress);
  try {
    const response = await fetch("/api/speech", {
      method: "POST",
      headers: { "Content-Type": "application/json" },
      body: JSON.stringify({ text }),
    });
    const body = await response.json();
    if (body.status === "success") {
      if (objectUrl) URL.revokeObjectURL(objectUrl);
      objectUrl = URL.createObjectURL(wavBlob(body.audio_base64, body.mime_type || MESSAGES.mime));
      player.src = objectUrl;
      download.href = objectUrl;
      download.download = body.filename;
      result.style.display = "block";
      showStatus("success", body.message);
    } else {
      showStatus(body.status === "warning" ? "warning" : "error", body.message);
    }
  } catch (err) {
    showStatus("error", MESSAGES.errorPrefix + err);
  } finally {
    button.disabled = false;
  }
});
</script>
</body>
</html>
"##;

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

fn messages_json() -> String {
    serde_json::json!({
        "progress": ui::PROGRESS_MESSAGE,
        "warning": ui::EMPTY_INPUT_WARNING,
        "errorPrefix": ui::ERROR_PREFIX,
        "mime": audio::MIME_TYPE,
    })
    .to_string()
    .replace("</", "<\\/")
}

/// Render the page with `default_text` in the input box
pub fn render(default_text: &str) -> String {
    PAGE.replace("{{TITLE}}", ui::TITLE)
        .replace("{{INPUT_LABEL}}", ui::INPUT_LABEL)
        .replace("{{BUTTON_LABEL}}", ui::BUTTON_LABEL)
        .replace("{{DOWNLOAD_LABEL}}", ui::DOWNLOAD_LABEL)
        .replace("{{MESSAGES}}", &messages_json())
        .replace("{{DEFAULT_TEXT}}", &escape_html(default_text))
}
