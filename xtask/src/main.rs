use camino::{Utf8Path, Utf8PathBuf};
use geofig::{Engine, OutputTarget, build_figure, prepare, render::raster::to_raster_with};
use rayon::prelude::*;
use serde::Deserialize;
use std::fs;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: cargo xtask <command>");
        eprintln!("Commands:");
        eprintln!("  gallery [fixtures-dir] [out-dir]    Render every scenario fixture to SVG, PNG and an HTML index");
        std::process::exit(1);
    }

    match args[1].as_str() {
        "gallery" => {
            let root = Utf8Path::new(env!("CARGO_MANIFEST_DIR"))
                .parent()
                .expect("xtask lives inside the workspace")
                .to_owned();
            let fixtures = args
                .get(2)
                .map(Utf8PathBuf::from)
                .unwrap_or_else(|| root.join("tests/fixtures"));
            let out = args
                .get(3)
                .map(Utf8PathBuf::from)
                .unwrap_or_else(|| root.join("target/gallery"));
            gallery(&fixtures, &out);
        }
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            std::process::exit(1);
        }
    }
}

#[derive(Deserialize)]
struct Scenario {
    payload: String,
    #[serde(default)]
    statement: String,
}

struct Entry {
    name: String,
    statement: String,
    payload: String,
    html: String,
    warnings: Vec<String>,
}

fn gallery(fixtures: &Utf8Path, out: &Utf8Path) {
    let mut paths: Vec<Utf8PathBuf> = fixtures
        .read_dir_utf8()
        .expect("Failed to read fixtures directory")
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.extension() == Some("json"))
        .collect();
    paths.sort();
    fs::create_dir_all(out).expect("Failed to create output directory");

    let engine = Engine::default();
    let entries: Vec<Entry> = paths
        .par_iter()
        .map(|path| render_one(&engine, path, out))
        .collect();

    let rendered = entries.iter().filter(|e| e.warnings.iter().all(|w| !w.starts_with("could not render"))).count();
    let index = out.join("index.html");
    fs::write(&index, page(&entries)).expect("Failed to write HTML");
    println!("Rendered {rendered}/{} fixtures into {index}", entries.len());
}

fn render_one(engine: &Engine, path: &Utf8Path, out: &Utf8Path) -> Entry {
    let name = path.file_stem().unwrap_or("fixture").to_string();
    eprintln!("Processing {name}...");
    let text = fs::read_to_string(path).unwrap_or_default();
    let scenario: Scenario = match serde_json::from_str(&text) {
        Ok(s) => s,
        Err(e) => Scenario { payload: String::new(), statement: format!("bad fixture: {e}") },
    };

    let figure = engine.render_exercise(&scenario.payload, &scenario.statement);
    if let Some(svg) = &figure.svg {
        fs::write(out.join(format!("{name}.svg")), svg).expect("Failed to write SVG");
    }

    // the PNG file is drawn at twice the engine's resolution
    let (schema, _) = prepare(&scenario.payload, &scenario.statement);
    let config = engine.config();
    if let Some(fig) = schema.and_then(|s| build_figure(&s, &config.render).ok()) {
        let r = &config.raster;
        match to_raster_with(&fig, &config.render, r.width * 2, r.height * 2, r.dpi * 2) {
            Ok(image) => fs::write(out.join(format!("{name}.png")), image.png).expect("Failed to write PNG"),
            Err(e) => eprintln!("{name}: no PNG: {e}"),
        }
    }

    Entry {
        name,
        statement: engine.render_math(&scenario.statement),
        payload: scenario.payload,
        html: figure.html(OutputTarget::Print),
        warnings: figure.warnings.iter().map(|w| w.to_string()).collect(),
    }
}

fn page(entries: &[Entry]) -> String {
    let mut html = String::new();
    html.push_str(&format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>geofig gallery</title>
    <style>
        body {{
            font-family: system-ui, sans-serif;
            margin: 0;
            padding: 24px;
            background: #eee;
            color: #333;
        }}
        .card {{
            background: white;
            border-radius: 8px;
            box-shadow: 0 1px 3px rgba(0,0,0,0.08);
            margin: 0 auto 16px;
            max-width: 960px;
            padding: 16px;
            display: grid;
            grid-template-columns: 1fr 1fr;
            gap: 16px;
        }}
        pre {{
            white-space: pre-wrap;
            font-size: 12px;
            background: #f6f6f6;
            padding: 8px;
        }}
        .warning {{
            color: #a60;
            font-size: 13px;
        }}
{}
    </style>
</head>
<body>
"#,
        Engine::stylesheet()
    ));

    for e in entries {
        let warnings: String = e
            .warnings
            .iter()
            .map(|w| format!(r#"<div class="warning">{}</div>"#, html_escape(w)))
            .collect();
        html.push_str(&format!(
            r#"<div class="card">
    <div>
        <h2>{}</h2>
        <p>{}</p>
        <pre>{}</pre>
        {}
    </div>
    <div>{}</div>
</div>
"#,
            e.name,
            e.statement,
            html_escape(&e.payload),
            warnings,
            e.html
        ));
    }

    html.push_str("</body></html>");
    html
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
