//! The upload page served at `/`.

pub const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Mistral OCR - PDF to Markdown</title>
<style>
  body { font-family: system-ui, sans-serif; margin: 0 auto; max-width: 1200px; padding: 1.5rem; color: #1f2328; }
  h1 { margin-bottom: 0.25rem; }
  .row { display: flex; gap: 1.5rem; flex-wrap: wrap; }
  .col { flex: 1 1 420px; display: flex; flex-direction: column; gap: 0.75rem; }
  label { font-weight: 600; }
  .hint { font-size: 0.85rem; color: #656d76; font-weight: normal; }
  button { padding: 0.6rem 1rem; font-size: 1rem; background: #ff7000; color: white; border: 0; border-radius: 6px; cursor: pointer; }
  button:disabled { background: #d0d7de; cursor: progress; }
  input[readonly], textarea { width: 100%; box-sizing: border-box; font-family: ui-monospace, monospace; }
  textarea { min-height: 28rem; }
  progress { width: 100%; }
  #download[hidden] { display: none; }
</style>
</head>
<body>
<h1>Mistral OCR: PDF to Markdown Converter</h1>
<p>Upload a PDF file to convert it to Markdown using Mistral's OCR API.</p>

<div class="row">
  <form class="col" id="form">
    <label for="file">Upload PDF</label>
    <input type="file" id="file" name="file" accept=".pdf" required>

    <label>
      <input type="checkbox" id="describe" checked>
      Include image descriptions
      <div class="hint">Replace image markers with AI-generated descriptions</div>
    </label>

    <button type="submit" id="convert">Convert to Markdown</button>

    <progress id="progress" max="1" value="0" hidden></progress>
    <div id="stage" class="hint"></div>

    <label for="status">Status</label>
    <input type="text" id="status" readonly>
  </form>

  <div class="col">
    <label for="markdown">Markdown Output</label>
    <textarea id="markdown" readonly></textarea>
    <label>Download Markdown File</label>
    <a id="download" hidden>Download</a>
  </div>
</div>

<h2>Instructions</h2>
<ol>
  <li>Upload a PDF file using the file picker above</li>
  <li>Toggle "Include image descriptions" to enable/disable AI-generated descriptions for figures and charts</li>
  <li>Click "Convert to Markdown" to process the PDF</li>
  <li>View the extracted markdown in the output box</li>
  <li>Download the markdown file using the download button</li>
</ol>
<p><strong>Note:</strong> Make sure you have set the <code>MISTRAL_API_KEY</code> environment variable with your Mistral API key.</p>

<script>
const $ = (id) => document.getElementById(id);
const POLL_MS = 750;

function show(job) {
  $("progress").value = job.progress;
  $("stage").textContent = job.description;
  $("status").value = job.status;
  $("markdown").value = job.markdown;
  const link = $("download");
  if (job.download_url) {
    link.href = job.download_url;
    link.textContent = job.file_name.replace(/\.[^.]*$/, "") + ".md";
    link.hidden = false;
  } else {
    link.hidden = true;
  }
}

async function poll(id) {
  const resp = await fetch(`/api/jobs/${id}`);
  if (!resp.ok) {
    const err = await resp.json().catch(() => ({ error: resp.statusText }));
    throw new Error(err.error);
  }
  const job = await resp.json();
  show(job);
  if (job.state === "succeeded" || job.state === "failed") return;
  await new Promise((r) => setTimeout(r, POLL_MS));
  return poll(id);
}

$("form").addEventListener("submit", async (ev) => {
  ev.preventDefault();
  const file = $("file").files[0];
  if (!file) return;

  const body = new FormData();
  body.append("file", file, file.name);
  body.append("include_image_descriptions", $("describe").checked ? "true" : "false");

  $("convert").disabled = true;
  $("progress").hidden = false;
  show({ progress: 0, description: "Uploading PDF to Mistral...", status: "", markdown: "", file_name: file.name });

  try {
    const resp = await fetch("/api/jobs", { method: "POST", body });
    const data = await resp.json();
    if (!resp.ok) throw new Error(data.error);
    await poll(data.id);
  } catch (e) {
    $("status").value = "✗ Error processing PDF: " + e.message;
  } finally {
    $("convert").disabled = false;
    $("progress").hidden = true;
  }
});
</script>
</body>
</html>
"##;
