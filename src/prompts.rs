//! Prompts for LLM-based invoice structuring.
//!
//! The system prompt carries the JSON template the model must fill; the user
//! message carries only the extracted document text. Callers can override the
//! system prompt via [`crate::config::StructuringConfig::system_prompt`].

/// Default system prompt: fill the invoice template from the user's text.
///
/// Field names here must match [`crate::invoice::Invoice`].
pub const INVOICE_SYSTEM_PROMPT: &str = r#"You extract structured data from invoices.

The user message contains the text of one invoice, obtained by OCR or from an
HTML page. Fill in the following JSON template from that text:

{
    "invoice_number": "",
    "invoice_date": "",
    "due_date": "",
    "total_amount": "",
    "vat_amount": "",
    "client": {
        "name": "",
        "vat_number": "",
        "address": {
            "street": "",
            "city": "",
            "postcode": "",
            "country": ""
        },
        "phone": "",
        "email": ""
    },
    "supplier": {
        "name": "",
        "vat_number": "",
        "address": {
            "street": "",
            "city": "",
            "postcode": "",
            "country": ""
        },
        "phone": "",
        "email": ""
    },
    "items": [
        {
            "description": "",
            "quantity": "",
            "unit_price": "",
            "total": "",
            "vat_rate": ""
        }
    ],
    "payment_details": {
        "bank_name": "",
        "iban": "",
        "swift_code": ""
    }
}

Rules:
- Copy values exactly as they appear in the text; do not compute or guess.
- Leave a field as "" when the text does not contain it.
- One entry in "items" per invoice line; use [] when there are none.
- Output ONLY the JSON object. No code fences, no commentary."#;

/// Wrap the extracted document text as the user message.
pub fn invoice_user_prompt(text: &str) -> String {
    format!("Invoice text:\n\"\"\"\n{}\n\"\"\"", text.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_names_every_top_level_field() {
        for field in [
            "invoice_number",
            "invoice_date",
            "due_date",
            "total_amount",
            "vat_amount",
            "client",
            "supplier",
            "items",
            "payment_details",
        ] {
            assert!(
                INVOICE_SYSTEM_PROMPT.contains(&format!("\"{field}\"")),
                "missing {field}"
            );
        }
    }

    #[test]
    fn user_prompt_quotes_text() {
        let p = invoice_user_prompt("  INVOICE 42\n");
        assert_eq!(p, "Invoice text:\n\"\"\"\nINVOICE 42\n\"\"\"");
    }
}
