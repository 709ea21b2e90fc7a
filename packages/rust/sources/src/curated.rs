//! Built-in listings used when live retrieval comes up short.

use sidequest_shared::SourceExperience;

/// A static listing compiled into the binary.
pub(crate) struct CuratedListing {
    pub name: &'static str,
    pub category: &'static str,
    pub description: &'static str,
    pub location: &'static str,
    pub budget_min: i64,
    pub budget_max: i64,
    pub timing: &'static str,
    pub time_of_day: &'static str,
}

impl CuratedListing {
    pub fn to_experience(&self, source_name: &str) -> SourceExperience {
        let mut exp =
            SourceExperience::new(self.name, source_name, self.category, self.location);
        exp.description = self.description.to_string();
        exp.budget_min = self.budget_min;
        exp.budget_max = self.budget_max;
        exp.timing_label = self.timing.to_string();
        exp.time_of_day = self.time_of_day.to_string();
        exp
    }
}

pub(crate) const GUIDE_FALLBACK: &[CuratedListing] = &[
    CuratedListing {
        name: "Bangalore Palace Audio Tour",
        category: "heritage",
        description: "Self-guided audio walk through the 1887 Tudor-style palace: carved wood, stained glass and royal portraits.",
        location: "Vasanth Nagar",
        budget_min: 230,
        budget_max: 460,
        timing: "10 AM - 5:30 PM",
        time_of_day: "afternoon",
    },
    CuratedListing {
        name: "Lalbagh Botanical Garden",
        category: "nature",
        description: "Old-growth trees, the Glass House and seasonal flower shows across 240 acres.",
        location: "Lalbagh",
        budget_min: 20,
        budget_max: 50,
        timing: "6 AM - 7 PM",
        time_of_day: "morning",
    },
    CuratedListing {
        name: "Nandi Hills Sunrise Trek",
        category: "nature",
        description: "Pre-dawn ride out of the city for sunrise above the clouds, popular with cyclists.",
        location: "Nandi Hills",
        budget_min: 200,
        budget_max: 500,
        timing: "4 AM - 10 AM",
        time_of_day: "morning",
    },
    CuratedListing {
        name: "Vidyarthi Bhavan Masala Dosa",
        category: "food",
        description: "Queue with regulars for a butter-heavy masala dosa at a Basavanagudi institution running since 1943.",
        location: "Basavanagudi",
        budget_min: 100,
        budget_max: 200,
        timing: "7:30 AM - 12 PM, 2:30 PM - 8 PM",
        time_of_day: "morning",
    },
    CuratedListing {
        name: "Rangoli Metro Art Center",
        category: "art",
        description: "Free gallery space under the MG Road metro with rotating shows and weekend workshops.",
        location: "MG Road",
        budget_min: 0,
        budget_max: 200,
        timing: "10 AM - 8 PM",
        time_of_day: "afternoon",
    },
    CuratedListing {
        name: "Chickpet Saree Shopping",
        category: "shopping",
        description: "Dense textile lanes of the old city: silk sarees, temple jewellery and wholesale fabric.",
        location: "Chickpet",
        budget_min: 500,
        budget_max: 5000,
        timing: "10 AM - 8 PM",
        time_of_day: "afternoon",
    },
    CuratedListing {
        name: "Kempegowda Museum",
        category: "heritage",
        description: "Small museum on the city's founder and its growth from mud fort to tech hub.",
        location: "Bangalore Fort",
        budget_min: 25,
        budget_max: 50,
        timing: "10 AM - 5:30 PM",
        time_of_day: "afternoon",
    },
    CuratedListing {
        name: "Toit Brewpub Experience",
        category: "music",
        description: "Busy microbrewery with on-site brews and a loud, friendly room.",
        location: "Indiranagar",
        budget_min: 800,
        budget_max: 1500,
        timing: "12 PM - 11:30 PM",
        time_of_day: "evening",
    },
];

pub(crate) const INSTAGRAM_FEED: &[CuratedListing] = &[
    CuratedListing {
        name: "Third Wave Coffee Roasters",
        category: "food",
        description: "Single-origin pour-overs in a bright, photogenic cafe.",
        location: "Indiranagar",
        budget_min: 300,
        budget_max: 600,
        timing: "Flexible",
        time_of_day: "morning",
    },
    CuratedListing {
        name: "The Pottery Lab Workshop",
        category: "craft",
        description: "Two-hour wheel throwing session; pieces are fired and handed back.",
        location: "Koramangala",
        budget_min: 1200,
        budget_max: 1800,
        timing: "Flexible",
        time_of_day: "afternoon",
    },
    CuratedListing {
        name: "Cubbon Reads Sunday Book Exchange",
        category: "art",
        description: "Bring a book, take a book; quiet group reading under the trees on Sunday mornings.",
        location: "Cubbon Park",
        budget_min: 0,
        budget_max: 100,
        timing: "Flexible",
        time_of_day: "morning",
    },
];

pub(crate) const TWITTER_FEED: &[CuratedListing] = &[
    CuratedListing {
        name: "Bangalore Astronomy Club Stargazing",
        category: "nature",
        description: "Monthly night sessions outside the city with shared telescopes and a guide to the sky.",
        location: "Nandi Hills",
        budget_min: 500,
        budget_max: 800,
        timing: "Flexible",
        time_of_day: "night",
    },
    CuratedListing {
        name: "Silent Disco at Cubbon Park",
        category: "music",
        description: "Wireless headphone party in the park with three DJ channels.",
        location: "Cubbon Park",
        budget_min: 400,
        budget_max: 600,
        timing: "Flexible",
        time_of_day: "evening",
    },
];
