//! Approved company domains
//!
//! This list is the only definition of the allowlist. The sign-in page gets
//! it injected at render time (see [`crate::assets`]), so the browser-side
//! and process-side checks cannot drift apart.

/// saas.group and its portfolio companies
const ALLOWED_DOMAINS: &[&str] = &[
    "addsearch.co",
    "addsearch.com",
    "advancedshippingmanager.com",
    "beekast.com",
    "crosstalent-rh.fr",
    "crosstalent.at",
    "crosstalent.be",
    "crosstalent.co.uk",
    "crosstalent.com",
    "crosstalent.de",
    "crosstalent.eu",
    "crosstalent.fr",
    "crosstalent.it",
    "crosstalent.nl",
    "dashthis.com",
    "getprerender.com",
    "getrewardful.com",
    "getscraperapi.com",
    "getusersnap.com",
    "gfconsulting.info",
    "git-tower.com",
    "gominga.com",
    "infonline.de",
    "juicer.io",
    "keyword-rank-tracking.com",
    "keyword.com",
    "keyword.net",
    "keyword.org",
    "kingwebmaster.com",
    "myworks.software",
    "picdrop.com",
    "picdrop.de",
    "pipelinecrm.com",
    "pipelinedeals.com",
    "pipelinedealsco.com",
    "pipelinesales.com",
    "prerender.io",
    "rewardful.com",
    "rewardful.io",
    "saas.blackfriday",
    "saas.group",
    "schumacher.me",
    "scraperapi.cloud",
    "scraperapi.co",
    "scraperapi.com",
    "scraperapi.io",
    "seobility.net",
    "timebutler.com",
    "timebutler.de",
    "tryprerender.com",
    "tryrewardful.co",
    "tryrewardful.com",
    "tsventures.io",
    "userewardful.com",
    "usersnap.com",
    "zenloop.com",
];

/// Case-insensitive exact match; subdomains of an approved domain are not approved.
pub fn is_allowed(domain: &str) -> bool {
    ALLOWED_DOMAINS
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(domain))
}

/// All approved domains, lower-case and sorted
pub fn allowed_domains() -> &'static [&'static str] {
    ALLOWED_DOMAINS
}

/// JSON array literal embedded into the sign-in page
pub(crate) fn allowed_domains_json() -> String {
    // A list of plain ASCII strings always serializes.
    serde_json::to_string(ALLOWED_DOMAINS).unwrap_or_else(|_| String::from("[]"))
}
