pub(crate) const INVOICE_NS: &str = "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2";
pub(crate) const CBC_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";
pub(crate) const CAC_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
pub(crate) const EXT_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:CommonExtensionComponents-2";
pub(crate) const SIG_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:CommonSignatureComponents-2";
pub(crate) const SAC_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:SignatureAggregateComponents-2";
pub(crate) const SBC_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:SignatureBasicComponents-2";
pub(crate) const DS_NS: &str = "http://www.w3.org/2000/09/xmldsig#";
pub(crate) const XADES_NS: &str = "http://uri.etsi.org/01903/v1.3.2#";

pub(crate) const PROFILE_ID: &str = "reporting:1.0";
pub(crate) const EXTENSION_URI: &str = "urn:oasis:names:specification:ubl:dsig:enveloped:xades";
pub(crate) const SIGNATURE_ID: &str = "urn:oasis:names:specification:ubl:signature:Invoice";
pub(crate) const SIGNATURE_METHOD: &str = "urn:oasis:names:specification:ubl:dsig:enveloped:xades";

pub(crate) const QR_REFERENCE_ID: &str = "QR";
pub(crate) const ICV_REFERENCE_ID: &str = "ICV";
pub(crate) const PIH_REFERENCE_ID: &str = "PIH";

pub(crate) const EXTENSION_CONTENT_PATH: &str =
    "/ubl:Invoice/ext:UBLExtensions/ext:UBLExtension/ext:ExtensionContent";
pub(crate) const QR_VALUE_PATH: &str = "//cac:AdditionalDocumentReference[cbc:ID[normalize-space(text())='QR']]/cac:Attachment/cbc:EmbeddedDocumentBinaryObject";

pub(crate) const INVOICE_DIGEST_PATH: &str =
    "//ds:SignedInfo/ds:Reference[@Id='invoiceSignedData']/ds:DigestValue";
pub(crate) const PROPERTIES_DIGEST_PATH: &str =
    "//ds:SignedInfo/ds:Reference[@URI='#xadesSignedProperties']/ds:DigestValue";
pub(crate) const SIGNATURE_VALUE_PATH: &str = "//ds:Signature/ds:SignatureValue";
pub(crate) const CERTIFICATE_PATH: &str = "//ds:KeyInfo/ds:X509Data/ds:X509Certificate";
pub(crate) const SIGNING_TIME_PATH: &str =
    "//xades:SignedProperties/xades:SignedSignatureProperties/xades:SigningTime";
pub(crate) const CERT_DIGEST_PATH: &str =
    "//xades:SignedSignatureProperties/xades:SigningCertificate/xades:Cert/xades:CertDigest/ds:DigestValue";
pub(crate) const ISSUER_NAME_PATH: &str =
    "//xades:SigningCertificate/xades:Cert/xades:IssuerSerial/ds:X509IssuerName";
pub(crate) const SERIAL_NUMBER_PATH: &str =
    "//xades:SigningCertificate/xades:Cert/xades:IssuerSerial/ds:X509SerialNumber";

pub(crate) const UBL_EXTENSIONS_TEMPLATE: &str = r#"<ext:UBLExtensions xmlns:ext="urn:oasis:names:specification:ubl:schema:xsd:CommonExtensionComponents-2">
    <ext:UBLExtension>
        <ext:ExtensionURI>urn:oasis:names:specification:ubl:dsig:enveloped:xades</ext:ExtensionURI>
        <ext:ExtensionContent/>
    </ext:UBLExtension>
</ext:UBLExtensions>"#;

pub(crate) const CAC_SIGNATURE_TEMPLATE: &str = r#"<cac:Signature xmlns:cac="urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2" xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2">
    <cbc:ID>urn:oasis:names:specification:ubl:signature:Invoice</cbc:ID>
    <cbc:SignatureMethod>urn:oasis:names:specification:ubl:dsig:enveloped:xades</cbc:SignatureMethod>
</cac:Signature>"#;

pub(crate) const QR_REFERENCE_TEMPLATE: &str = r#"<cac:AdditionalDocumentReference xmlns:cac="urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2" xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2">
    <cbc:ID>QR</cbc:ID>
    <cac:Attachment>
        <cbc:EmbeddedDocumentBinaryObject mimeCode="text/plain"></cbc:EmbeddedDocumentBinaryObject>
    </cac:Attachment>
</cac:AdditionalDocumentReference>"#;

/// Signature block placed inside `ext:ExtensionContent`.
pub(crate) const SIGNATURE_BLOCK_TEMPLATE: &str = r##"<sig:UBLDocumentSignatures xmlns:sig="urn:oasis:names:specification:ubl:schema:xsd:CommonSignatureComponents-2" xmlns:sac="urn:oasis:names:specification:ubl:schema:xsd:SignatureAggregateComponents-2" xmlns:sbc="urn:oasis:names:specification:ubl:schema:xsd:SignatureBasicComponents-2" xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2">
                <sac:SignatureInformation>
                    <cbc:ID>urn:oasis:names:specification:ubl:signature:1</cbc:ID>
                    <sbc:ReferencedSignatureID>urn:oasis:names:specification:ubl:signature:Invoice</sbc:ReferencedSignatureID>
                    <ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#" Id="signature">
                        <ds:SignedInfo>
                            <ds:CanonicalizationMethod Algorithm="http://www.w3.org/2006/12/xml-c14n11"/>
                            <ds:SignatureMethod Algorithm="http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256"/>
                            <ds:Reference Id="invoiceSignedData" URI="">
                                <ds:Transforms>
                                    <ds:Transform Algorithm="http://www.w3.org/TR/1999/REC-xpath-19991116">
                                        <ds:XPath>not(//ancestor-or-self::ext:UBLExtensions)</ds:XPath>
                                    </ds:Transform>
                                    <ds:Transform Algorithm="http://www.w3.org/TR/1999/REC-xpath-19991116">
                                        <ds:XPath>not(//ancestor-or-self::cac:Signature)</ds:XPath>
                                    </ds:Transform>
                                    <ds:Transform Algorithm="http://www.w3.org/TR/1999/REC-xpath-19991116">
                                        <ds:XPath>not(//ancestor-or-self::cac:AdditionalDocumentReference[cbc:ID='QR'])</ds:XPath>
                                    </ds:Transform>
                                    <ds:Transform Algorithm="http://www.w3.org/2006/12/xml-c14n11"/>
                                </ds:Transforms>
                                <ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>
                                <ds:DigestValue></ds:DigestValue>
                            </ds:Reference>
                            <ds:Reference Type="http://www.w3.org/2000/09/xmldsig#SignatureProperties" URI="#xadesSignedProperties">
                                <ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>
                                <ds:DigestValue></ds:DigestValue>
                            </ds:Reference>
                        </ds:SignedInfo>
                        <ds:SignatureValue></ds:SignatureValue>
                        <ds:KeyInfo>
                            <ds:X509Data>
                                <ds:X509Certificate></ds:X509Certificate>
                            </ds:X509Data>
                        </ds:KeyInfo>
                        <ds:Object>
                            <xades:QualifyingProperties xmlns:xades="http://uri.etsi.org/01903/v1.3.2#" Target="signature">
                                <xades:SignedProperties Id="xadesSignedProperties">
                                    <xades:SignedSignatureProperties>
                                        <xades:SigningTime></xades:SigningTime>
                                        <xades:SigningCertificate>
                                            <xades:Cert>
                                                <xades:CertDigest>
                                                    <ds:DigestMethod Algorithm="http://www.w3.org/2001/04/xmlenc#sha256"/>
                                                    <ds:DigestValue></ds:DigestValue>
                                                </xades:CertDigest>
                                                <xades:IssuerSerial>
                                                    <ds:X509IssuerName></ds:X509IssuerName>
                                                    <ds:X509SerialNumber></ds:X509SerialNumber>
                                                </xades:IssuerSerial>
                                            </xades:Cert>
                                        </xades:SigningCertificate>
                                    </xades:SignedSignatureProperties>
                                </xades:SignedProperties>
                            </xades:QualifyingProperties>
                        </ds:Object>
                    </ds:Signature>
                </sac:SignatureInformation>
            </sig:UBLDocumentSignatures>"##;

/// Whitespace-exact signed-properties text hashed for the
/// `#xadesSignedProperties` reference. Placeholders are replaced in order.
pub(crate) const SIGNED_PROPERTIES_HASH_TEMPLATE: &str = concat!(
    "<xades:SignedProperties xmlns:xades=\"http://uri.etsi.org/01903/v1.3.2#\" Id=\"xadesSignedProperties\">\n",
    "                                    <xades:SignedSignatureProperties>\n",
    "                                        <xades:SigningTime>{SIGNING_TIME}</xades:SigningTime>\n",
    "                                        <xades:SigningCertificate>\n",
    "                                            <xades:Cert>\n",
    "                                                <xades:CertDigest>\n",
    "                                                    <ds:DigestMethod xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\" Algorithm=\"http://www.w3.org/2001/04/xmlenc#sha256\"></ds:DigestMethod>\n",
    "                                                    <ds:DigestValue xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\">{CERT_DIGEST}</ds:DigestValue>\n",
    "                                                </xades:CertDigest>\n",
    "                                                <xades:IssuerSerial>\n",
    "                                                    <ds:X509IssuerName xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\">{ISSUER_NAME}</ds:X509IssuerName>\n",
    "                                                    <ds:X509SerialNumber xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\">{SERIAL_NUMBER}</ds:X509SerialNumber>\n",
    "                                                </xades:IssuerSerial>\n",
    "                                            </xades:Cert>\n",
    "                                        </xades:SigningCertificate>\n",
    "                                    </xades:SignedSignatureProperties>\n",
    "                                </xades:SignedProperties>",
);
