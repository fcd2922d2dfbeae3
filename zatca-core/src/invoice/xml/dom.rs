//! Operations on rendered invoice documents.
use super::InvoiceXmlError;
use super::constants::{
    CAC_NS, CAC_SIGNATURE_TEMPLATE, CBC_NS, DS_NS, EXT_NS, INVOICE_NS, QR_REFERENCE_TEMPLATE,
    QR_VALUE_PATH, SAC_NS, SBC_NS, SIG_NS, UBL_EXTENSIONS_TEMPLATE, XADES_NS,
};
use libxml::parser::Parser;
use libxml::tree::{Document, Node};
use libxml::xpath::Context;

const QR_REFERENCE_PATH: &str =
    "//cac:AdditionalDocumentReference[cbc:ID[normalize-space(text())='QR']]";

pub(crate) fn parse(xml: &str) -> Result<Document, InvoiceXmlError> {
    Parser::default()
        .parse_string(xml)
        .map_err(|e| InvoiceXmlError::Parse(format!("{e:?}")))
}

/// XPath context with every invoice namespace registered.
pub(crate) fn context(doc: &Document) -> Result<Context, InvoiceXmlError> {
    let ctx = Context::new(doc)
        .map_err(|_| InvoiceXmlError::XPath("failed to create xpath context".into()))?;
    let namespaces = [
        ("ubl", INVOICE_NS),
        ("cbc", CBC_NS),
        ("cac", CAC_NS),
        ("ext", EXT_NS),
        ("sig", SIG_NS),
        ("sac", SAC_NS),
        ("sbc", SBC_NS),
        ("ds", DS_NS),
        ("xades", XADES_NS),
    ];
    for (prefix, href) in namespaces {
        ctx.register_namespace(prefix, href)
            .map_err(|_| InvoiceXmlError::XPath(format!("failed to register prefix {prefix}")))?;
    }
    Ok(ctx)
}

pub(crate) fn nodes(ctx: &Context, path: &str) -> Result<Vec<Node>, InvoiceXmlError> {
    Ok(ctx
        .evaluate(path)
        .map_err(|_| InvoiceXmlError::XPath(path.to_string()))?
        .get_nodes_as_vec())
}

/// Trimmed text of the first match, `None` when absent or blank.
pub(crate) fn text(ctx: &Context, path: &str) -> Result<Option<String>, InvoiceXmlError> {
    let value = nodes(ctx, path)?
        .first()
        .map(|node| node.get_content().trim().to_string());
    Ok(value.filter(|value| !value.is_empty()))
}

pub(crate) fn required_text(ctx: &Context, path: &str) -> Result<String, InvoiceXmlError> {
    text(ctx, path)?.ok_or_else(|| InvoiceXmlError::MissingNode(path.to_string()))
}

/// Replace the content of every match. The value is escaped first since
/// libxml treats node content as markup.
pub(crate) fn set_text(ctx: &Context, path: &str, value: &str) -> Result<(), InvoiceXmlError> {
    let targets = nodes(ctx, path)?;
    if targets.is_empty() {
        return Err(InvoiceXmlError::MissingNode(path.to_string()));
    }
    let escaped = quick_xml::escape::escape(value);
    for mut node in targets {
        node.set_content(&escaped)
            .map_err(|e| InvoiceXmlError::Mutation(e.to_string()))?;
    }
    Ok(())
}

/// Parse a standalone fragment and adopt its root into `doc`.
pub(crate) fn import_fragment(doc: &mut Document, xml: &str) -> Result<Node, InvoiceXmlError> {
    let fragment = parse(xml)?;
    let mut node = fragment
        .get_root_element()
        .ok_or_else(|| InvoiceXmlError::MissingNode("fragment root".into()))?;
    node.unlink();
    doc.import_node(&mut node)
        .map_err(|_| InvoiceXmlError::Mutation("failed to import fragment".into()))
}

fn first_element_child(node: &Node) -> Option<Node> {
    let mut current = node.get_first_child();
    while let Some(child) = current {
        if child.is_element_node() {
            return Some(child);
        }
        current = child.get_next_sibling();
    }
    None
}

fn root(doc: &Document) -> Result<Node, InvoiceXmlError> {
    doc.get_root_element()
        .ok_or_else(|| InvoiceXmlError::MissingNode("Invoice root".into()))
}

/// Add the extension block, QR reference and signature placeholder when a
/// caller-supplied document lacks them.
pub(crate) fn ensure_signature_structure(doc: &mut Document) -> Result<(), InvoiceXmlError> {
    let mut root = root(doc)?;
    let ctx = context(doc)?;

    if nodes(&ctx, "/ubl:Invoice/ext:UBLExtensions")?.is_empty() {
        let mut extensions = import_fragment(doc, UBL_EXTENSIONS_TEMPLATE)?;
        match first_element_child(&root) {
            Some(mut first) => first
                .add_prev_sibling(&mut extensions)
                .map_err(|e| InvoiceXmlError::Mutation(e.to_string()))?,
            None => root
                .add_child(&mut extensions)
                .map_err(|e| InvoiceXmlError::Mutation(e.to_string()))?,
        }
    }

    ensure_qr_reference(doc, &ctx)?;

    if nodes(&ctx, "/ubl:Invoice/cac:Signature")?.is_empty() {
        let mut signature = import_fragment(doc, CAC_SIGNATURE_TEMPLATE)?;
        let anchor = nodes(&ctx, "/ubl:Invoice/cac:AdditionalDocumentReference")?.pop();
        match anchor {
            Some(mut last) => last
                .add_next_sibling(&mut signature)
                .map_err(|e| InvoiceXmlError::Mutation(e.to_string()))?,
            None => match nodes(&ctx, "/ubl:Invoice/cac:AccountingSupplierParty")?.pop() {
                Some(mut supplier) => supplier
                    .add_prev_sibling(&mut signature)
                    .map_err(|e| InvoiceXmlError::Mutation(e.to_string()))?,
                None => root
                    .add_child(&mut signature)
                    .map_err(|e| InvoiceXmlError::Mutation(e.to_string()))?,
            },
        }
    }
    Ok(())
}

fn ensure_qr_reference(doc: &mut Document, ctx: &Context) -> Result<(), InvoiceXmlError> {
    if !nodes(ctx, QR_REFERENCE_PATH)?.is_empty() {
        return Ok(());
    }
    let mut reference = import_fragment(doc, QR_REFERENCE_TEMPLATE)?;
    if let Some(mut last) = nodes(ctx, "/ubl:Invoice/cac:AdditionalDocumentReference")?.pop() {
        return last
            .add_next_sibling(&mut reference)
            .map_err(|e| InvoiceXmlError::Mutation(e.to_string()));
    }
    if let Some(mut signature) = nodes(ctx, "/ubl:Invoice/cac:Signature")?.pop() {
        return signature
            .add_prev_sibling(&mut reference)
            .map_err(|e| InvoiceXmlError::Mutation(e.to_string()));
    }
    root(doc)?
        .add_child(&mut reference)
        .map_err(|e| InvoiceXmlError::Mutation(e.to_string()))
}

/// Write `qr` into the QR reference, creating the reference if needed.
pub(crate) fn set_qr(doc: &mut Document, qr: &str) -> Result<(), InvoiceXmlError> {
    let ctx = context(doc)?;
    ensure_qr_reference(doc, &ctx)?;
    set_text(&ctx, QR_VALUE_PATH, qr)
}

pub(crate) fn qr_value(doc: &Document) -> Result<Option<String>, InvoiceXmlError> {
    let ctx = context(doc)?;
    text(&ctx, QR_VALUE_PATH)
}

/// Embed a QR payload into a rendered invoice.
///
/// The placeholder is located by its `QR` reference id, not by position.
pub fn inject_qr(xml: &str, qr: &str) -> Result<String, InvoiceXmlError> {
    let mut doc = parse(xml)?;
    set_qr(&mut doc, qr)?;
    Ok(doc.to_string())
}

/// Read the QR payload from a rendered invoice, e.g. one returned by
/// clearance. Returns `None` when the placeholder is empty.
pub fn extract_qr(xml: &str) -> Result<Option<String>, InvoiceXmlError> {
    qr_value(&parse(xml)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Invoice xmlns="urn:oasis:names:specification:ubl:schema:xsd:Invoice-2" xmlns:cac="urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2" xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2">
    <cbc:ID>INV-1</cbc:ID>
    <cac:AdditionalDocumentReference>
        <cbc:ID>ICV</cbc:ID>
        <cbc:UUID>1</cbc:UUID>
    </cac:AdditionalDocumentReference>
    <cac:AccountingSupplierParty/>
</Invoice>"#;

    #[test]
    fn missing_structure_is_added_in_order() {
        let mut doc = parse(MINIMAL).expect("parse");
        ensure_signature_structure(&mut doc).expect("structure");
        let xml = doc.to_string();

        let ext = xml.find("UBLExtensions").expect("extensions");
        let icv = xml.find(">ICV<").expect("icv");
        let qr = xml.find(">QR<").expect("qr");
        let signature = xml.find("<cac:Signature").expect("signature");
        let supplier = xml.find("AccountingSupplierParty").expect("supplier");
        assert!(ext < icv && icv < qr && qr < signature && signature < supplier, "{xml}");

        // Running it again must not duplicate anything.
        ensure_signature_structure(&mut doc).expect("structure");
        assert_eq!(doc.to_string().matches(">QR<").count(), 1);
    }

    #[test]
    fn inject_then_extract_qr() {
        assert_eq!(extract_qr(MINIMAL).expect("extract"), None);
        let injected = inject_qr(MINIMAL, "AQVBY21lIA==").expect("inject");
        assert_eq!(
            extract_qr(&injected).expect("extract").as_deref(),
            Some("AQVBY21lIA==")
        );
        let replaced = inject_qr(&injected, "Ag==").expect("inject");
        assert_eq!(extract_qr(&replaced).expect("extract").as_deref(), Some("Ag=="));
    }

    #[test]
    fn set_text_escapes_markup() {
        let doc = parse(MINIMAL).expect("parse");
        let ctx = context(&doc).expect("ctx");
        set_text(&ctx, "/ubl:Invoice/cbc:ID", "A & B <C>").expect("set");
        assert_eq!(required_text(&ctx, "/ubl:Invoice/cbc:ID").expect("text"), "A & B <C>");
        assert!(doc.to_string().contains("A &amp; B &lt;C&gt;"));
    }

    #[test]
    fn malformed_documents_are_rejected() {
        assert!(matches!(extract_qr("<Invoice"), Err(InvoiceXmlError::Parse(_))));
        let doc = parse(MINIMAL).expect("parse");
        let ctx = context(&doc).expect("ctx");
        assert!(matches!(
            required_text(&ctx, "//cbc:IssueDate"),
            Err(InvoiceXmlError::MissingNode(_))
        ));
    }
}
