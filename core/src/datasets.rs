//! Static data tables backing the name/location/lorem generators. Small
//! but representative `&'static [&'static str]` slices, in the shape the
//! generator catalog expects (`crate::datasets::{names, locations, domains}`).

pub mod names {
    pub const FIRST_NAMES: &[&str] = &[
        "Olivia", "Liam", "Emma", "Noah", "Ava", "Oliver", "Sophia", "Elijah", "Isabella",
        "James", "Mia", "Benjamin", "Charlotte", "Lucas", "Amelia", "Henry", "Harper", "Alexander",
        "Evelyn", "Mateo", "Luna", "Daniel", "Camila", "Jackson", "Gianna", "Sebastian", "Aria",
        "Jack", "Scarlett", "Owen",
    ];

    pub const LAST_NAMES: &[&str] = &[
        "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
        "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
        "Moore", "Jackson", "Martin", "Lee", "Perez", "Thompson", "White", "Harris", "Sanchez",
        "Clark", "Ramirez", "Lewis", "Robinson",
    ];

    pub const JOB_TITLES: &[&str] = &[
        "Software Engineer",
        "Product Manager",
        "Data Analyst",
        "Sales Director",
        "Marketing Specialist",
        "Operations Lead",
        "Customer Success Manager",
        "Financial Analyst",
        "UX Designer",
        "Systems Administrator",
    ];
}

pub mod locations {
    pub const CITIES: &[&str] = &[
        "Lisbon", "Porto", "Madrid", "Barcelona", "Paris", "Berlin", "Amsterdam", "Vienna",
        "Prague", "Dublin", "London", "Rome", "Milan", "Warsaw", "Budapest", "Oslo", "Stockholm",
        "Copenhagen", "Helsinki", "Zurich",
    ];

    pub const COUNTRIES: &[&str] = &[
        "Portugal", "Spain", "France", "Germany", "Netherlands", "Austria", "Czechia", "Ireland",
        "United Kingdom", "Italy", "Poland", "Hungary", "Norway", "Sweden", "Denmark", "Finland",
        "Switzerland",
    ];

    pub const STREET_SUFFIXES: &[&str] = &[
        "Street", "Avenue", "Boulevard", "Lane", "Road", "Drive", "Court", "Place", "Terrace",
    ];
}

pub mod domains {
    pub const EMAIL_DOMAINS: &[&str] = &[
        "example.com",
        "mail.example.org",
        "inbox.example.net",
        "test.example.io",
    ];

    pub const COMPANY_SUFFIXES: &[&str] =
        &["Inc.", "LLC", "Group", "Partners", "Holdings", "Solutions", "& Co."];

    pub const LOREM_WORDS: &[&str] = &[
        "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed",
        "do", "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna",
        "aliqua", "enim", "ad", "minim", "veniam", "quis", "nostrud", "exercitation",
    ];
}
