//! The 16-bit flag mask carried by every [`Trigger`](crate::rule::Trigger)
//! and compared against a query mask at match time.
//!
//! The core engine (NFA/DFA/bytecode) treats these bits as entirely opaque —
//! a `u16` it shuffles around unexamined, per spec. This module just gives
//! callers typed names for the bits everyone ends up wanting in practice
//! (load type, a handful of resource types, and the if-domain/unless-domain
//! pair), grounded in the same shape as WebKit's real content-extension
//! flags and `RequestType`/`PartyMask` in the betterblocker-style crate in
//! the example pack. Nothing in `nfa`, `dfa` or `bytecode` depends on these
//! names; they could be renumbered freely without touching the engine.

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TriggerFlags: u16 {
        /// Request initiated by the same registrable domain as the main document.
        const FIRST_PARTY = 1 << 0;
        /// Request initiated by a different registrable domain.
        const THIRD_PARTY = 1 << 1;
        const DOCUMENT = 1 << 2;
        const IMAGE = 1 << 3;
        const STYLE_SHEET = 1 << 4;
        const SCRIPT = 1 << 5;
        const FONT = 1 << 6;
        const MEDIA = 1 << 7;
        const SVG_DOCUMENT = 1 << 8;
        const RAW = 1 << 9;
        const POPUP = 1 << 10;
        /// Trigger carries an `if-domain` condition (domain list is an allow-list).
        const IF_DOMAIN = 1 << 11;
        /// Trigger carries an `unless-domain` condition (domain list is a deny-list).
        const UNLESS_DOMAIN = 1 << 12;

        /// All resource-type bits, for a trigger that doesn't restrict resource type.
        const ALL_RESOURCE_TYPES = Self::DOCUMENT.bits()
            | Self::IMAGE.bits()
            | Self::STYLE_SHEET.bits()
            | Self::SCRIPT.bits()
            | Self::FONT.bits()
            | Self::MEDIA.bits()
            | Self::SVG_DOCUMENT.bits()
            | Self::RAW.bits()
            | Self::POPUP.bits();
    }
}

/// The flags a caller supplies at match time, describing the load context of
/// the request being tested. Same bit layout as [`TriggerFlags`]; kept as a
/// distinct type so "trigger wants X" and "this load is Y" can't be mixed up
/// by accident at a call site.
pub type QueryFlags = TriggerFlags;
