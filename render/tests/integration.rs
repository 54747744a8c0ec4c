use pretty_assertions::assert_eq;

use blockdoc::block::Block;
use blockdoc::parser::parse;
use blockdoc_render::{Mode, Style, dump, highlight, skeleton};

const PAGE: &str = r#"<html>
{% block head %}{# Document head #}
  <title>{% block title %}Untitled{% endblock %}</title>
{% endblock %}
{% block body %}
  {# Main page body.
     Override in child templates. #}
  <main>

  {% block content %}{% endblock %}

  </main>
{% endblock body %}
</html>
"#;

fn blocks(source: &str) -> Vec<Block> {
    parse(source).expect("parse failed").blocks
}

/// Names and comments with the same nesting.
fn outline(blocks: &[Block]) -> Vec<(usize, String, String)> {
    fn walk(blocks: &[Block], depth: usize, out: &mut Vec<(usize, String, String)>) {
        for b in blocks {
            out.push((depth, b.name.clone(), b.comment.clone()));
            walk(&b.children, depth + 1, out);
        }
    }
    let mut out = Vec::new();
    walk(blocks, 0, &mut out);
    out
}

#[test]
fn dump_report() {
    let expected = "\
Name: head
Comment: Document head
Default Value: <title></title>
Blocks:
  Name: title
  Comment:
  Default Value: Untitled
  Blocks: (no sub-blocks)

Name: body
Comment: Main page body.
       Override in child templates.
Default Value: <main>
    </main>
Blocks:
  Name: content
  Comment:
  Default Value: (none)
  Blocks: (no sub-blocks)
";
    assert_eq!(dump(&blocks(PAGE)), expected);
}

#[test]
fn dump_of_empty_template() {
    assert_eq!(dump(&[]), "(no blocks found)\n");
}

#[test]
fn skeleton_output() {
    let expected = "\
{% block head %}
    {# Document head #}
    Default: <title></title>
    {% block title %}
        Default: Untitled
    {% endblock title %}
{% endblock head %}
{% block body %}
    {# Main page body.
     Override in child templates. #}
    Default:
        <main>
          </main>
    {% block content %}
    {% endblock content %}
{% endblock body %}
";
    assert_eq!(skeleton(&blocks(PAGE)), expected);
}

#[test]
fn skeleton_reparses_to_same_structure() {
    let original = blocks(PAGE);
    let text = skeleton(&original);
    let reparsed = blocks(&text);
    assert_eq!(outline(&reparsed), outline(&original));

    // Defaults come back behind the label.
    let title = &reparsed[0].children[0];
    assert_eq!(title.default_value.as_deref(), Some("Default: Untitled"));
    assert_eq!(reparsed[1].children[0].default_value, None);
}

#[test]
fn skeleton_round_trip_is_stable() {
    let once = skeleton(&blocks(PAGE));
    let twice = skeleton(&blocks(&once));
    let thrice = skeleton(&blocks(&twice));
    assert_eq!(outline(&blocks(&twice)), outline(&blocks(&thrice)));
}

#[test]
fn mode_dispatch() {
    let template = parse("{% block a %}x{% endblock %}").unwrap();
    assert_eq!(Mode::Dump.render(&template), dump(&template.blocks));
    assert_eq!(Mode::Skeleton.render(&template), skeleton(&template.blocks));

    let mut out = Vec::new();
    Mode::Skeleton.write(&template, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "{% block a %}\n    Default: x\n{% endblock a %}\n");
    assert_eq!("skeleton".parse::<Mode>(), Ok(Mode::Skeleton));
}

#[test]
fn highlighted_skeleton() {
    let text = skeleton(&blocks(PAGE));
    let out = highlight::html(&text, Style::Monokai);
    assert!(out.html.contains(r#"<span class="n">content</span>"#));
    assert!(out.html.contains("&lt;title&gt;"));
    assert!(out.css.contains("#272822"));
    assert!(out.to_fragment().starts_with("<style>\n.blockdoc {"));
}
