use anyhow::{Context, Result};
use handlebars::{Handlebars, handlebars_helper};

const LAYOUT_HEAD: &str = r#"<!doctype html>
<html><head><meta charset="utf-8"><title>Shorts Studio</title>
<style>
body{font-family:sans-serif;background:#191919;color:#ddd;margin:2em}
a{color:#7aa7ff} table{border-collapse:collapse} td,th{padding:4px 10px;border-bottom:1px solid #333}
.ok{color:#6c6} .no{color:#c66} .error{color:#fff;background:#933;padding:4px 8px}
.scene{display:flex;gap:16px;margin-bottom:18px} .scene img{height:320px}
textarea{width:420px;height:90px;background:#222;color:#ddd}
</style>
<script>
async function post(url, body, target) {
  const resp = await fetch(url, {method: 'POST', body: body ? new URLSearchParams(body) : null});
  document.getElementById(target).innerHTML = await resp.text();
}
</script></head><body>"#;

const DASHBOARD: &str = r#"{{> head}}
<h1>Series</h1>
<p>{{completed}} of {{total}} videos completed</p>
{{#each series}}
<h2>{{name}}</h2>
<table>
<tr><th>#</th><th>text</th><th>score</th><th>storyboard</th><th>images</th><th>speech</th><th>upload</th><th>completed</th></tr>
{{#each videos}}
<tr>
<td><a href="/storyboard/{{../name}}/{{ordinal}}">{{ordinal}}</a></td>
{{#if error}}<td colspan="7"><span class="error">{{error}}</span></td>{{else}}
<td>{{flag status.text_completed}}</td>
<td>{{score}}</td>
<td>{{flag status.storyboard_completed}}</td>
<td>{{approved}}/{{scenes}}</td>
<td>{{flag status.tts_completed}}</td>
<td>{{flag status.ready_to_upload}}</td>
<td>{{flag completed}}</td>{{/if}}
</tr>
{{/each}}
</table>
{{else}}
<p>No series yet under {{root}}.</p>
{{/each}}
</body></html>"#;

const STORYBOARD: &str = r#"{{> head}}
<p><a href="/">&larr; all series</a></p>
<h1>{{series}} #{{n}}: {{title}}</h1>
<div id="stage">{{> stage}}</div>
<p>
<button onclick="post('/video/{{series}}/{{n}}/evaluate', null, 'stage')">Evaluate text</button>
<button onclick="post('/video/{{series}}/{{n}}/images', null, 'stage')">Generate images</button>
<button onclick="post('/video/{{series}}/{{n}}/tts', null, 'stage')">Generate speech</button>
<button onclick="post('/video/{{series}}/{{n}}/render', null, 'stage')">Render video</button>
</p>
{{#if video_url}}<video src="{{video_url}}" controls height="480"></video>{{/if}}
{{#each scenes}}
<div class="scene">
<div id="img-{{index}}">{{> image}}</div>
<div>
<h3>Scene {{index}}</h3>
<textarea id="text-{{index}}">{{text}}</textarea><br>
<button onclick="post('/storyboard/update/{{../series}}/{{../n}}/{{index}}/text', {value: document.getElementById('text-{{index}}').value}, 'saved-{{index}}')">Save text</button>
<textarea id="prompt-{{index}}">{{image}}</textarea><br>
<button onclick="post('/storyboard/update/{{../series}}/{{../n}}/{{index}}/image', {value: document.getElementById('prompt-{{index}}').value}, 'saved-{{index}}')">Save prompt</button>
<button onclick="post('/storyboard/remake_image/{{../series}}/{{../n}}/{{index}}', {prompt: document.getElementById('prompt-{{index}}').value}, 'img-{{index}}')">Remake image</button>
<span id="saved-{{index}}"></span>
{{#if audio_url}}<br><audio src="{{audio_url}}" controls></audio>{{/if}}
</div>
</div>
{{/each}}
</body></html>"#;

const IMAGE: &str = r#"{{#if image_url}}<img src="{{image_url}}">{{else}}<p class="no">no image</p>{{/if}}
<div id="approve-{{index}}">{{> approval}}</div>"#;

const APPROVAL: &str = r#"{{#if approved}}<span class="ok">approved</span>
<button onclick="post('/storyboard/update_image_status/{{series}}/{{n}}/{{index}}/false', null, 'approve-{{index}}')">Reject</button>{{else}}<span class="no">not approved</span>
<button onclick="post('/storyboard/update_image_status/{{series}}/{{n}}/{{index}}/true', null, 'approve-{{index}}')">Approve</button>{{/if}}"#;

const STAGE: &str = r#"text {{flag status.text_completed}} | score {{score}} | storyboard {{flag status.storyboard_completed}} | images {{approved}}/{{scenes}} | speech {{flag status.tts_completed}} | upload {{flag status.ready_to_upload}}{{#if message}} <b>{{message}}</b>{{/if}}"#;

const SAVED: &str = r#"<span class="ok">saved {{field}}</span>"#;

pub const DASHBOARD_PAGE: &str = "dashboard";
pub const STORYBOARD_PAGE: &str = "storyboard";
pub const IMAGE_FRAGMENT: &str = "image";
pub const APPROVAL_FRAGMENT: &str = "approval";
pub const STAGE_FRAGMENT: &str = "stage";
pub const SAVED_FRAGMENT: &str = "saved";

pub fn build() -> Result<Handlebars<'static>> {
    let mut hb = Handlebars::new();

    handlebars_helper!(flag: |v: bool| if v { "✔" } else { "·" });
    hb.register_helper("flag", Box::new(flag));

    for (name, source) in [
        ("head", LAYOUT_HEAD),
        (DASHBOARD_PAGE, DASHBOARD),
        (STORYBOARD_PAGE, STORYBOARD),
        (IMAGE_FRAGMENT, IMAGE),
        (APPROVAL_FRAGMENT, APPROVAL),
        (STAGE_FRAGMENT, STAGE),
        (SAVED_FRAGMENT, SAVED),
    ] {
        hb.register_template_string(name, source)
            .with_context(|| format!("template '{name}' is invalid"))?;
    }
    Ok(hb)
}
