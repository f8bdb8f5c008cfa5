//! The single-page GUI served at `/`.

use std::path::Path;

/// Escape HTML special characters to prevent XSS attacks.
fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

/// Generate the GUI page.
///
/// The picker opens in `start_dir`. Everything else is driven by the JSON
/// API from the browser.
pub fn render_index(start_dir: &Path) -> String {
    let start_dir = html_escape(&start_dir.display().to_string());
    let version = env!("CARGO_PKG_VERSION");

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>TIFF Squeeze</title>
    <style>
        * {{
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }}
        body {{
            background: #f4f5f7;
            color: #1f2328;
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, sans-serif;
            font-size: 14px;
            padding: 24px;
        }}
        main {{
            max-width: 880px;
            margin: 0 auto;
            background: #fff;
            border: 1px solid #d0d7de;
            border-radius: 8px;
            padding: 20px 24px;
        }}
        h1 {{
            font-size: 18px;
            margin-bottom: 16px;
        }}
        h1 small {{
            color: #656d76;
            font-weight: normal;
            font-size: 12px;
        }}
        .row {{
            display: flex;
            gap: 8px;
            align-items: center;
            margin-bottom: 12px;
        }}
        input[type=text] {{
            flex: 1;
            padding: 6px 8px;
            border: 1px solid #d0d7de;
            border-radius: 4px;
            font-family: ui-monospace, SFMono-Regular, Menlo, monospace;
        }}
        button {{
            padding: 6px 14px;
            border: 1px solid #d0d7de;
            border-radius: 4px;
            background: #f6f8fa;
            cursor: pointer;
        }}
        button.primary {{
            background: #1f883d;
            border-color: #1a7f37;
            color: #fff;
        }}
        button:disabled {{
            opacity: 0.5;
            cursor: default;
        }}
        #browser {{
            border: 1px solid #d0d7de;
            border-radius: 4px;
            max-height: 240px;
            overflow-y: auto;
            margin-bottom: 12px;
        }}
        #browser div {{
            padding: 4px 8px;
            cursor: pointer;
            font-family: ui-monospace, SFMono-Regular, Menlo, monospace;
        }}
        #browser div:hover {{
            background: #eaeef2;
        }}
        #browser .selected {{
            background: #ddf4ff;
        }}
        #browser .done {{
            color: #656d76;
        }}
        progress {{
            width: 100%;
            height: 12px;
        }}
        #status {{
            color: #656d76;
            margin: 4px 0 12px;
        }}
        #log {{
            background: #0d1117;
            color: #e6edf3;
            border-radius: 4px;
            padding: 10px 12px;
            height: 240px;
            overflow-y: auto;
            white-space: pre-wrap;
            font-family: ui-monospace, SFMono-Regular, Menlo, monospace;
            font-size: 12px;
        }}
        #plot {{
            max-width: 100%;
            margin-top: 12px;
            display: none;
        }}
    </style>
</head>
<body>
<main>
    <h1>TIFF Squeeze <small>v{version}</small></h1>

    <div class="row">
        <input type="text" id="path" placeholder="File or folder" value="{start_dir}">
        <button id="up">Up</button>
        <button id="open">Open</button>
    </div>
    <div id="browser"></div>

    <div class="row">
        Method:
        <label><input type="radio" name="method" value="zip" checked> ZIP</label>
        <label><input type="radio" name="method" value="lzw"> LZW</label>
        <label><input type="radio" name="method" value="packbits"> PackBits</label>
    </div>
    <div class="row">
        Afterwards:
        <select id="retention">
            <option value="delete">delete the discarded file</option>
            <option value="backup">move it to a backup folder</option>
            <option value="keep-both">keep both (dry run)</option>
        </select>
        <input type="text" id="backup" placeholder="Backup folder" style="display:none">
    </div>
    <div class="row">
        <button class="primary" id="compress">Compress</button>
    </div>

    <progress id="bar" max="100" value="0"></progress>
    <div id="status">Ready</div>
    <div id="log"></div>
    <img id="plot" alt="Verification plot">
</main>
<script>
    const $ = (id) => document.getElementById(id);
    let listing = null;
    let poller = null;

    function log(text) {{
        $("log").textContent += text + "\n";
        $("log").scrollTop = $("log").scrollHeight;
    }}

    async function browse(path) {{
        const res = await fetch("/api/browse?path=" + encodeURIComponent(path));
        const body = await res.json();
        if (!res.ok) {{
            log("Error: " + body.message);
            return;
        }}
        listing = body;
        $("path").value = body.path;
        const list = $("browser");
        list.innerHTML = "";
        for (const entry of body.entries) {{
            const row = document.createElement("div");
            row.textContent = (entry.kind === "dir" ? "[dir] " : "") + entry.name;
            if (entry.compressed) row.className = "done";
            row.onclick = () => {{
                for (const r of list.children) r.classList.remove("selected");
                row.classList.add("selected");
                $("path").value = entry.path;
            }};
            row.ondblclick = () => {{
                if (entry.kind === "dir") browse(entry.path);
            }};
            list.appendChild(row);
        }}
    }}

    async function poll() {{
        const res = await fetch("/api/progress");
        if (!res.ok) return;
        const state = await res.json();
        $("bar").value = state.percent;
        $("status").textContent = state.status;
        $("log").textContent = state.log.join("\n");
    }}

    async function compress() {{
        const path = $("path").value.trim();
        if (!path) {{
            alert("Please select a file or folder first");
            return;
        }}
        const method = document.querySelector("input[name=method]:checked").value;
        const retention = $("retention").value;
        const request = {{ path, method, retention }};
        if (retention === "backup") request.backup_dir = $("backup").value.trim();

        $("compress").disabled = true;
        $("plot").style.display = "none";
        $("bar").value = 0;
        $("status").textContent = "Processing...";
        poller = setInterval(poll, 500);
        try {{
            const res = await fetch("/api/compress", {{
                method: "POST",
                headers: {{ "Content-Type": "application/json" }},
                body: JSON.stringify(request),
            }});
            const body = await res.json();
            clearInterval(poller);
            if (!res.ok) {{
                $("status").textContent = "Error occurred!";
                log("An error occurred: " + body.message);
                alert("An error occurred: " + body.message);
                return;
            }}
            await poll();
            $("log").textContent = body.log.join("\n");
            showPlot(body);
            alert("Compression completed successfully!");
        }} finally {{
            clearInterval(poller);
            $("compress").disabled = false;
            if (listing) browse(listing.path);
        }}
    }}

    function showPlot(report) {{
        if ($("retention").value !== "keep-both") return;
        const file = report.files.find((f) => f.report);
        if (!file) return;
        const q = new URLSearchParams({{ original: file.input, compressed: file.compressed, frame: 0 }});
        $("plot").src = "/api/diff?" + q;
        $("plot").style.display = "block";
    }}

    $("open").onclick = () => browse($("path").value);
    $("up").onclick = () => {{
        if (listing && listing.parent) browse(listing.parent);
    }};
    $("retention").onchange = () => {{
        $("backup").style.display = $("retention").value === "backup" ? "block" : "none";
    }};
    $("compress").onclick = compress;
    browse($("path").value);
</script>
</body>
</html>
"##
    )
}
