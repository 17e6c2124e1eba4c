//! Fixed vocabularies the listing form draws from: pricing tiers, benefits, and locations.

use serde::Serialize;

/// Paid listing window. The price is in whole US dollars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PricingTier {
    pub days: u32,
    pub price: u32,
    pub description: &'static str,
}

impl PricingTier {
    pub const fn price_cents(&self) -> u64 {
        self.price as u64 * 100
    }
}

pub const PRICING_TIERS: [PricingTier; 3] = [
    PricingTier {
        days: 30,
        price: 60,
        description: "Standard listing",
    },
    PricingTier {
        days: 60,
        price: 100,
        description: "Extended visibility",
    },
    PricingTier {
        days: 90,
        price: 150,
        description: "Maximum exposure",
    },
];

pub fn pricing_tier(days: u32) -> Option<&'static PricingTier> {
    PRICING_TIERS.iter().find(|tier| tier.days == days)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Benefit {
    pub id: &'static str,
    pub label: &'static str,
}

pub const BENEFITS: &[Benefit] = &[
    Benefit { id: "401k", label: "401(k)" },
    Benefit { id: "distributed", label: "Distributed Team" },
    Benefit { id: "async", label: "Async" },
    Benefit { id: "vision", label: "Vision Insurance" },
    Benefit { id: "dental", label: "Dental Insurance" },
    Benefit { id: "medical", label: "Medical Insurance" },
    Benefit { id: "unlimited_vacation", label: "Unlimited Vacation" },
    Benefit { id: "pto", label: "Paid Time Off" },
    Benefit { id: "four_day", label: "4 Day Work Week" },
    Benefit { id: "401k_matching", label: "401k Matching" },
    Benefit { id: "company_retreats", label: "Company Retreats" },
    Benefit { id: "coworking_budget", label: "Coworking Budget" },
    Benefit { id: "learning_budget", label: "Learning Budget" },
    Benefit { id: "free_gym", label: "Free Gym Membership" },
    Benefit { id: "mental_wellness", label: "Mental Wellness Budget" },
    Benefit { id: "home_office", label: "Home Office Budget" },
    Benefit { id: "pay_in_crypto", label: "Pay in Crypto" },
    Benefit { id: "pseudonymous", label: "Pseudonymous" },
    Benefit { id: "profit_sharing", label: "Profit Sharing" },
    Benefit { id: "equity_compensation", label: "Equity Compensation" },
    Benefit { id: "no_whiteboard", label: "No Whiteboard Interview" },
    Benefit { id: "no_monitoring", label: "No Monitoring System" },
    Benefit { id: "no_politics", label: "No Politics at Work" },
    Benefit { id: "we_hire_old", label: "We hire old (and young)" },
];

pub fn is_known_benefit(id: &str) -> bool {
    BENEFITS.iter().any(|benefit| benefit.id == id)
}

/// Location value meaning "remote, anywhere".
pub const WORLDWIDE: &str = "worldwide";

pub const COUNTRIES: &[&str] = &[
    "Afghanistan", "Albania", "Algeria", "Andorra", "Angola", "Antigua and Barbuda",
    "Argentina", "Armenia", "Australia", "Austria", "Azerbaijan", "Bahamas", "Bahrain",
    "Bangladesh", "Barbados", "Belarus", "Belgium", "Belize", "Benin", "Bhutan", "Bolivia",
    "Bosnia and Herzegovina", "Botswana", "Brazil", "Brunei", "Bulgaria", "Burkina Faso",
    "Burundi", "Cabo Verde", "Cambodia", "Cameroon", "Canada", "Central African Republic",
    "Chad", "Chile", "China", "Colombia", "Comoros", "Congo", "Costa Rica", "Croatia", "Cuba",
    "Cyprus", "Czech Republic", "Democratic Republic of the Congo", "Denmark", "Djibouti",
    "Dominica", "Dominican Republic", "Ecuador", "Egypt", "El Salvador", "Equatorial Guinea",
    "Eritrea", "Estonia", "Eswatini", "Ethiopia", "Fiji", "Finland", "France", "Gabon",
    "Gambia", "Georgia", "Germany", "Ghana", "Greece", "Grenada", "Guatemala", "Guinea",
    "Guinea-Bissau", "Guyana", "Haiti", "Honduras", "Hungary", "Iceland", "India",
    "Indonesia", "Iran", "Iraq", "Ireland", "Israel", "Italy", "Ivory Coast", "Jamaica",
    "Japan", "Jordan", "Kazakhstan", "Kenya", "Kiribati", "Kuwait", "Kyrgyzstan", "Laos",
    "Latvia", "Lebanon", "Lesotho", "Liberia", "Libya", "Liechtenstein", "Lithuania",
    "Luxembourg", "Madagascar", "Malawi", "Malaysia", "Maldives", "Mali", "Malta",
    "Marshall Islands", "Mauritania", "Mauritius", "Mexico", "Micronesia", "Moldova",
    "Monaco", "Mongolia", "Montenegro", "Morocco", "Mozambique", "Myanmar", "Namibia",
    "Nauru", "Nepal", "Netherlands", "New Zealand", "Nicaragua", "Niger", "Nigeria",
    "North Korea", "North Macedonia", "Norway", "Oman", "Pakistan", "Palau", "Palestine",
    "Panama", "Papua New Guinea", "Paraguay", "Peru", "Philippines", "Poland", "Portugal",
    "Qatar", "Romania", "Russia", "Rwanda", "Saint Kitts and Nevis", "Saint Lucia",
    "Saint Vincent and the Grenadines", "Samoa", "San Marino", "Sao Tome and Principe",
    "Saudi Arabia", "Senegal", "Serbia", "Seychelles", "Sierra Leone", "Singapore",
    "Slovakia", "Slovenia", "Solomon Islands", "Somalia", "South Africa", "South Korea",
    "South Sudan", "Spain", "Sri Lanka", "Sudan", "Suriname", "Sweden", "Switzerland",
    "Syria", "Taiwan", "Tajikistan", "Tanzania", "Thailand", "Timor-Leste", "Togo", "Tonga",
    "Trinidad and Tobago", "Tunisia", "Turkey", "Turkmenistan", "Tuvalu", "Uganda",
    "Ukraine", "United Arab Emirates", "United Kingdom", "United States", "Uruguay",
    "Uzbekistan", "Vanuatu", "Vatican City", "Venezuela", "Vietnam", "Yemen", "Zambia",
    "Zimbabwe",
];

/// Resolves a submitted location to its canonical spelling.
pub fn canonical_location(value: &str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case(WORLDWIDE) {
        return Some(WORLDWIDE);
    }
    COUNTRIES
        .iter()
        .copied()
        .find(|country| country.eq_ignore_ascii_case(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_cover_thirty_sixty_ninety_days() {
        let days: Vec<u32> = PRICING_TIERS.iter().map(|tier| tier.days).collect();
        assert_eq!(days, vec![30, 60, 90]);
        assert_eq!(pricing_tier(60).map(|tier| tier.price), Some(100));
        assert_eq!(pricing_tier(60).map(PricingTier::price_cents), Some(10_000));
        assert!(pricing_tier(45).is_none());
    }

    #[test]
    fn locations_resolve_case_insensitively() {
        assert_eq!(canonical_location("WorldWide"), Some(WORLDWIDE));
        assert_eq!(canonical_location(" germany"), Some("Germany"));
        assert_eq!(canonical_location("Atlantis"), None);
    }
}
