//! BulletML XML reader
//!
//! Streams a document through `quick_xml` and builds a [`Pattern`]. The result is
//! validated before it is returned, so a pattern that loads cleanly cannot hit a
//! structural error later when its tasks are activated.

use std::io::BufRead;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{Expr, NodeId, NodeName, Pattern, ValueMode};
use crate::consts::MAX_NEST_DEPTH;
use crate::error::{PatternError, Result};

fn xml_error(e: impl std::fmt::Display) -> PatternError {
    PatternError::Xml(e.to_string())
}

impl Pattern {
    /// Parse a pattern from an XML string
    pub fn from_xml_str(name: impl Into<String>, xml: &str) -> Result<Pattern> {
        Self::from_reader(name, xml.as_bytes())
    }

    /// Parse a pattern from any buffered reader
    pub fn from_reader<R: BufRead>(name: impl Into<String>, source: R) -> Result<Pattern> {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(true);

        let mut pattern = Pattern::new(name);
        // Open elements with the text collected so far
        let mut stack: Vec<(NodeId, String)> = Vec::new();
        let mut seen_root = false;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_event_into(&mut buf).map_err(xml_error)? {
                Event::Start(e) => {
                    if stack.len() >= MAX_NEST_DEPTH {
                        return Err(PatternError::Xml(format!(
                            "elements nested deeper than {} levels",
                            MAX_NEST_DEPTH
                        )));
                    }
                    let id = open_element(&mut pattern, &stack, &e, &mut seen_root)?;
                    stack.push((id, String::new()));
                }
                Event::Empty(e) => {
                    let id = open_element(&mut pattern, &stack, &e, &mut seen_root)?;
                    close_element(&mut pattern, id, "")?;
                }
                Event::Text(t) => {
                    if let Some((_, text)) = stack.last_mut() {
                        text.push_str(&t.unescape().map_err(xml_error)?);
                    }
                }
                Event::CData(c) => {
                    if let Some((_, text)) = stack.last_mut() {
                        text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                    }
                }
                Event::End(_) => {
                    if let Some((id, text)) = stack.pop() {
                        close_element(&mut pattern, id, &text)?;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !seen_root {
            return Err(PatternError::Xml("document has no <bulletml> root".into()));
        }

        pattern.validate()?;
        log::info!(
            "Loaded pattern '{}' ({} nodes, {} top actions)",
            pattern.name(),
            pattern.len(),
            pattern.top_actions().len()
        );
        Ok(pattern)
    }
}

fn open_element(
    pattern: &mut Pattern,
    stack: &[(NodeId, String)],
    e: &BytesStart<'_>,
    seen_root: &mut bool,
) -> Result<NodeId> {
    let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
    let name = NodeName::from_str(&tag).ok_or(PatternError::UnknownElement(tag))?;

    let id = match (name, stack.last()) {
        (NodeName::Bulletml, None) if !*seen_root => {
            *seen_root = true;
            // The root's `type` (vertical/horizontal) only concerns the host's axes
            return Ok(pattern.root());
        }
        (NodeName::Bulletml, _) => {
            return Err(PatternError::Xml("<bulletml> must be the document root".into()));
        }
        (_, None) => {
            return Err(PatternError::Xml(format!(
                "<{}> outside of <bulletml>",
                name
            )));
        }
        (_, Some((parent, _))) => pattern.add_node(*parent, name),
    };

    for attr in e.attributes() {
        let attr = attr.map_err(xml_error)?;
        let value = attr.unescape_value().map_err(xml_error)?;
        match attr.key.local_name().as_ref() {
            b"label" => pattern.set_label(id, value.as_ref()),
            b"type" => {
                let mode = ValueMode::from_str(value.trim());
                let accepts = match (name, mode) {
                    (NodeName::Direction, Some(_)) => true,
                    (NodeName::Speed | NodeName::Horizontal | NodeName::Vertical, Some(m)) => {
                        m != ValueMode::Aim
                    }
                    _ => false,
                };
                match mode {
                    Some(mode) if accepts => pattern.set_mode(id, mode),
                    _ => {
                        return Err(PatternError::InvalidAttribute {
                            node: name,
                            attr: "type".into(),
                            value: value.into_owned(),
                        });
                    }
                }
            }
            _ => {}
        }
    }

    Ok(id)
}

fn close_element(pattern: &mut Pattern, id: NodeId, text: &str) -> Result<()> {
    let text = text.trim();
    if pattern.node(id).name.carries_value() && !text.is_empty() {
        pattern.set_expression(id, Expr::parse(text)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPIRAL: &str = r#"<?xml version="1.0" ?>
<bulletml type="vertical" xmlns="http://www.asahi-net.or.jp/~cs8k-cyu/bulletml">
  <action label="top">
    <repeat>
      <times>10 + $rank * 20</times>
      <action>
        <fire>
          <direction type="sequence">23</direction>
          <bulletRef label="shot">
            <param>1.5</param>
          </bulletRef>
        </fire>
        <wait>2</wait>
      </action>
    </repeat>
  </action>
  <bullet label="shot">
    <speed>$1</speed>
    <action>
      <changeSpeed>
        <speed type="relative">-1</speed>
        <term>30</term>
      </changeSpeed>
      <vanish/>
    </action>
  </bullet>
</bulletml>"#;

    #[test]
    fn test_load_document() {
        let p = Pattern::from_xml_str("spiral", SPIRAL).expect("spiral loads");
        assert_eq!(p.name(), "spiral");
        let tops = p.top_actions();
        assert_eq!(tops.len(), 1);

        let repeat = p.child(tops[0], NodeName::Repeat).expect("repeat");
        let times = p.child(repeat, NodeName::Times).expect("times");
        assert!(p.node(times).expr.is_some());

        let body = p.child(repeat, NodeName::Action).expect("body");
        let fire = p.child(body, NodeName::Fire).expect("fire");
        let dir = p.child(fire, NodeName::Direction).expect("direction");
        assert_eq!(p.node(dir).mode, Some(ValueMode::Sequence));
        assert_eq!(p.node(dir).expr, Some(Expr::Const(23.0)));

        let bref = p.child(fire, NodeName::BulletRef).expect("bulletRef");
        let shot = p.resolve(bref).expect("resolves");
        let speed = p.child(shot, NodeName::Speed).expect("speed");
        assert_eq!(p.node(speed).expr, Some(Expr::Param(0)));
        assert_eq!(p.node(speed).mode, None);
    }

    #[test]
    fn test_empty_elements() {
        let p = Pattern::from_xml_str(
            "v",
            "<bulletml><action label=\"top\"><vanish/></action></bulletml>",
        )
        .expect("loads");
        let top = p.top_actions()[0];
        assert!(p.child(top, NodeName::Vanish).is_some());
    }

    #[test]
    fn test_unknown_element() {
        let err = Pattern::from_xml_str("bad", "<bulletml><laser/></bulletml>").unwrap_err();
        assert_eq!(err, PatternError::UnknownElement("laser".into()));
    }

    #[test]
    fn test_aim_speed_rejected() {
        let xml = r#"<bulletml><action label="top"><fire>
            <speed type="aim">1</speed><bullet/></fire></action></bulletml>"#;
        let err = Pattern::from_xml_str("bad", xml).unwrap_err();
        assert!(matches!(err, PatternError::InvalidAttribute { .. }));
    }

    #[test]
    fn test_fire_without_bullet_rejected() {
        let xml = r#"<bulletml><action label="top"><fire>
            <direction>0</direction></fire></action></bulletml>"#;
        let err = Pattern::from_xml_str("bad", xml).unwrap_err();
        assert!(matches!(err, PatternError::MissingBullet(_)));
    }

    #[test]
    fn test_bad_expression_rejected() {
        let xml = r#"<bulletml><action label="top"><wait>3 +</wait></action></bulletml>"#;
        let err = Pattern::from_xml_str("bad", xml).unwrap_err();
        assert!(matches!(err, PatternError::Expression { .. }));
    }

    #[test]
    fn test_deep_nesting_rejected() {
        let nested = |levels: usize| {
            format!(
                "<bulletml><action label=\"top\">{}<vanish/>{}</action></bulletml>",
                "<action>".repeat(levels),
                "</action>".repeat(levels)
            )
        };
        assert!(Pattern::from_xml_str("ok", &nested(MAX_NEST_DEPTH - 3)).is_ok());
        let err = Pattern::from_xml_str("deep", &nested(5_000)).unwrap_err();
        assert!(matches!(err, PatternError::Xml(_)));
    }

    #[test]
    fn test_malformed_xml() {
        let err = Pattern::from_xml_str("bad", "<bulletml><action></bulletml>").unwrap_err();
        assert!(matches!(err, PatternError::Xml(_)));
        let err = Pattern::from_xml_str("bad", "<action/>").unwrap_err();
        assert!(matches!(err, PatternError::Xml(_)));
    }
}
