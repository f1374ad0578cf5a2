use scraper::{ElementRef, Html};

/// One direct child of a container. `tag` is `None` for text, comments and
/// anything else that is not an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub tag: Option<String>,
    pub text: String,
}

impl Node {
    pub fn element(tag: &str, text: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.to_string()),
            text: text.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            tag: None,
            text: text.into(),
        }
    }
}

/// First element in document order whose `id` attribute equals `id`.
pub fn find_by_id<'a>(doc: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    doc.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().id() == Some(id))
}

/// Direct children of the container `container_id`, in document order.
/// `None` when the page has no such container.
pub fn container_nodes(doc: &Html, container_id: &str) -> Option<Vec<Node>> {
    let container = find_by_id(doc, container_id)?;
    let nodes = container
        .children()
        .map(|child| match child.value() {
            scraper::Node::Element(el) => {
                let text = ElementRef::wrap(child)
                    .map(|e| e.text().collect::<String>())
                    .unwrap_or_default();
                Node::element(el.name(), text)
            }
            scraper::Node::Text(t) => Node::text(String::from(&**t)),
            _ => Node::text(""),
        })
        .collect();
    Some(nodes)
}
