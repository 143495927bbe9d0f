//! Text labels placed on the panel, with title-block variables.

use chrono::{DateTime, Local};

use crate::geometry::Point;
use crate::panel::config::{HJustify, TextConfig, TextType, VJustify};
use crate::panel::Panel;
use crate::parser::board::title_block_field;
use crate::parser::sexp::SExp;

/// Replace `{date}`, `{time24}`, `{year}` and the `{board...}` title block
/// variables. Unknown variables are left as they are.
pub fn expand_variables(template: &str, title_block: Option<&SExp>, now: &DateTime<Local>) -> String {
    let field = |name: &str| {
        title_block
            .and_then(|tb| title_block_field(tb, name))
            .unwrap_or("")
            .to_string()
    };

    let mut text = template
        .replace("{date}", &now.format("%Y-%m-%d").to_string())
        .replace("{time24}", &now.format("%H:%M").to_string())
        .replace("{year}", &now.format("%Y").to_string())
        .replace("{boardTitle}", &field("title"))
        .replace("{boardRevision}", &field("rev"))
        .replace("{boardDate}", &field("date"))
        .replace("{boardCompany}", &field("company"));
    for n in 1..=9 {
        let key = format!("{{boardComment{n}}}");
        if text.contains(&key) {
            text = text.replace(&key, &field(&format!("comment {n}")));
        }
    }
    text
}

fn justify(config: &TextConfig) -> Option<SExp> {
    let mut values = Vec::new();
    match config.hjustify {
        HJustify::Left => values.push(SExp::atom("left")),
        HJustify::Right => values.push(SExp::atom("right")),
        HJustify::Center => {}
    }
    match config.vjustify {
        VJustify::Top => values.push(SExp::atom("top")),
        VJustify::Bottom => values.push(SExp::atom("bottom")),
        VJustify::Center => {}
    }
    if config.layer.starts_with("B.") {
        values.push(SExp::atom("mirror"));
    }
    (!values.is_empty()).then(|| SExp::node("justify", values))
}

pub fn text_item(text: String, at: Point, config: &TextConfig, uuid: String) -> SExp {
    let mut effects = vec![SExp::node(
        "font",
        vec![
            SExp::node("size", vec![SExp::number(config.height), SExp::number(config.width)]),
            SExp::node("thickness", vec![SExp::number(config.thickness)]),
        ],
    )];
    effects.extend(justify(config));
    SExp::node(
        "gr_text",
        vec![
            SExp::string(text),
            SExp::node(
                "at",
                vec![
                    SExp::number(at.x),
                    SExp::number(at.y),
                    SExp::number(config.orientation),
                ],
            ),
            SExp::node("layer", vec![SExp::string(config.layer.clone())]),
            SExp::node("uuid", vec![SExp::string(uuid)]),
            SExp::node("effects", effects),
        ],
    )
}

/// Add one text section's label; `None` when the section is disabled.
pub fn build_text(panel: &mut Panel, config: &TextConfig, now: &DateTime<Local>) -> Option<String> {
    if config.kind == TextType::None {
        return None;
    }
    let bbox = panel.bbox()?;
    let text = expand_variables(&config.text, panel.title_block(), now);
    let at = bbox.anchor(config.anchor).offset(config.hoffset, config.voffset);
    let uuid = panel.new_uuid();
    panel.add_item(text_item(text.clone(), at, config, uuid));
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Anchor;
    use crate::parser::sexp::SExpParser;
    use chrono::TimeZone;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap()
    }

    #[test]
    fn test_expand_variables() {
        let tb = SExpParser::new(
            r#"(title_block (title "Sensor") (rev "B") (company "Kallows") (comment 2 "batch 7"))"#,
        )
        .parse()
        .unwrap();
        let text = expand_variables(
            "{boardTitle} rev {boardRevision} / {boardCompany} / {boardComment2} / {date} {time24} / {unknown}",
            Some(&tb),
            &now(),
        );
        assert_eq!(text, "Sensor rev B / Kallows / batch 7 / 2024-03-09 14:05 / {unknown}");
    }

    #[test]
    fn test_missing_title_block_expands_empty() {
        assert_eq!(expand_variables("[{boardTitle}] {year}", None, &now()), "[] 2024");
    }

    #[test]
    fn test_text_item_layout() {
        let config = TextConfig {
            kind: TextType::Simple,
            text: "x".into(),
            anchor: Anchor::MidTop,
            hoffset: 0.0,
            voffset: 2.0,
            orientation: 0.0,
            width: 1.5,
            height: 1.5,
            thickness: 0.3,
            hjustify: HJustify::Left,
            vjustify: VJustify::Center,
            layer: "B.SilkS".into(),
        };
        let item = text_item("PANEL".into(), Point::new(1.0, 2.0), &config, "u".into());
        assert_eq!(
            item.to_string(),
            "(gr_text \"PANEL\" (at 1 2 0) (layer \"B.SilkS\") (uuid \"u\") (effects (font (size 1.5 1.5) (thickness 0.3)) (justify left mirror)))"
        );
    }
}
