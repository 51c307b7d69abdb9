/// Integration tests for the render driver

use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tessel_bind::Registry;
use tessel_cli::{RenderError, RenderOptions, Renderer};

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_render_with_data_and_overrides() {
    let dir = TempDir::new().unwrap();
    let template = write(
        dir.path(),
        "page.html",
        r#"<h1>{{title}}</h1><ul t-repeat="item in items"><li>{{item}}</li></ul><p>{{user.name}}</p>"#,
    );
    let data = write(dir.path(), "data.json", r#"{"title": "Groceries", "items": ["milk", "eggs"]}"#);

    let options = RenderOptions::new(&template)
        .data_file(&data)
        .set("user.name", "Ann")
        .set("title", r#""Shopping""#);
    let output = Renderer::new(options).unwrap().render().unwrap();

    assert_eq!(
        output.html,
        concat!(
            r#"<h1><span t-bind="title">Shopping</span></h1>"#,
            r#"<ul t-repeat="item in items"><li><span t-bind="item">milk</span></li><li><span t-bind="item">eggs</span></li></ul>"#,
            r#"<p><span t-bind="user.name">Ann</span></p>"#,
        )
    );
    assert_eq!(output.source_file, template);
    assert_eq!(output.widgets, 3);
}

#[test]
fn test_normalize_only() {
    let dir = TempDir::new().unwrap();
    let template = write(dir.path(), "t.html", r#"<a href="/u/{{id}}">{{ name | upper }}</a>"#);
    let output = Renderer::new(RenderOptions::new(&template).normalize_only(true))
        .unwrap()
        .render()
        .unwrap();
    assert_eq!(
        output.html,
        r#"<a href="/u/{{id}}" t-attr="{&quot;href&quot;:&quot;/u/{{id}}&quot;}"><span t-bind="name" t-filters="upper"></span></a>"#
    );
    assert_eq!(output.widgets, 0);
}

#[test]
fn test_run_writes_output_file() {
    let dir = TempDir::new().unwrap();
    let template = write(dir.path(), "t.html", "<p>{{greeting}}</p>");
    let out = dir.path().join("out.html");
    let options = RenderOptions::new(&template).set("greeting", "hi").output(&out);
    Renderer::new(options).unwrap().run().unwrap();
    assert_eq!(fs::read_to_string(&out).unwrap(), r#"<p><span t-bind="greeting">hi</span></p>"#);
}

#[test]
fn test_custom_registry_controller() {
    let dir = TempDir::new().unwrap();
    let template = write(dir.path(), "t.html", r#"<div t-controller="Clock"><b>{{now}}</b></div>"#);
    let registry = Registry::with_defaults().unwrap();
    registry.register_controller("Clock", |scope| {
        scope.set("now", "12:00");
        Ok(())
    });
    let output = Renderer::with_registry(RenderOptions::new(&template), registry)
        .render()
        .unwrap();
    assert!(output.html.contains("12:00"));
}

#[test]
fn test_errors() {
    let dir = TempDir::new().unwrap();

    let missing = Renderer::new(RenderOptions::new(dir.path().join("nope.html")))
        .unwrap()
        .render();
    assert!(matches!(missing, Err(RenderError::Io { .. })));

    let template = write(dir.path(), "t.html", "<p>{{x}}</p>");
    let array = write(dir.path(), "array.json", "[1, 2]");
    let not_object = Renderer::new(RenderOptions::new(&template).data_file(&array))
        .unwrap()
        .render();
    assert!(matches!(not_object, Err(RenderError::DataNotObject(_))));

    let broken = write(dir.path(), "broken.json", "{");
    let bad_json = Renderer::new(RenderOptions::new(&template).data_file(&broken))
        .unwrap()
        .render();
    assert!(matches!(bad_json, Err(RenderError::Data { .. })));

    let unterminated = write(dir.path(), "bad.html", "<p");
    let markup = Renderer::new(RenderOptions::new(&unterminated)).unwrap().render();
    assert!(matches!(markup, Err(RenderError::Markup { .. })));

    let controller = write(dir.path(), "c.html", r#"<div t-controller="Missing"></div>"#);
    let bind = Renderer::new(RenderOptions::new(&controller)).unwrap().render();
    assert!(matches!(bind, Err(RenderError::Bind(_))));
}
