//! Human-readable letter text sent to peers.
//!
//! Peers in the marketplace read Spanish, so bodies and subjects are written
//! in Spanish. Resource maps are embedded as pretty JSON so that a peer's own
//! parser can pick them up verbatim.

use trueque_types::ResourceMap;

/// Subject of the status broadcast.
pub const STATUS_SUBJECT: &str = "Estado de recursos";

/// Subject of the letter sent after accepting an offer.
pub const TRADE_CONFIRMATION_SUBJECT: &str = "Confirmación de oferta aceptada";

/// Subject of the letter sent after reciprocating a confirmation.
pub const RECIPROCATION_SUBJECT: &str = "Envío de recursos acordados";

/// Subject of an outbound micro-offer.
pub const MICRO_OFFER_SUBJECT: &str = "Propuesta de intercambio";

fn render_map(map: &ResourceMap) -> String {
    serde_json::to_string_pretty(map).unwrap_or_else(|_| "{}".to_owned())
}

/// Status letter advertising what we need and what we can give.
///
/// `surplus` must already exclude the scarce resource.
pub fn status_letter(needs: &ResourceMap, surplus: &ResourceMap) -> String {
    format!(
        "Necesito:\n{}\n\nOfrezco:\n{}\n\n\
         Si te interesa intercambiar, por favor propón un trato indicando:\n\
         - qué recursos me ofreces y cuántas unidades\n\
         - qué recursos quieres a cambio y cuántas unidades\n\
         - si me has enviado ya recursos (confirmación de envío)",
        render_map(needs),
        render_map(surplus),
    )
}

/// Letter confirming an accepted offer: what we sent, what we expect back.
pub fn trade_confirmation_letter(sent: &ResourceMap, expected: &ResourceMap) -> String {
    format!(
        "He aceptado tu oferta.\n\n\
         Te he enviado los recursos que pedías:\n{}\n\n\
         Espero recibir a cambio los recursos que ofrecías:\n{}",
        render_map(sent),
        render_map(expected),
    )
}

/// Letter sent after reciprocating a peer's confirmation.
pub fn reciprocation_letter(received: &ResourceMap, sent: &ResourceMap) -> String {
    format!(
        "Gracias, he recibido:\n{}\n\nTe he enviado a cambio:\n{}",
        render_map(received),
        render_map(sent),
    )
}

/// One-for-one micro-offer: "I offer `give_qty` of `give`, I need
/// `want_qty` of `want`".
pub fn micro_offer_letter(give: &str, give_qty: u32, want: &str, want_qty: u32) -> String {
    format!(
        "Te ofrezco {give_qty} de {give} a cambio de {want_qty} de {want}.\n\
         Si aceptas, envíame {want_qty} de {want} y confírmamelo por carta; \
         te enviaré {give_qty} de {give} en cuanto lo reciba."
    )
}
