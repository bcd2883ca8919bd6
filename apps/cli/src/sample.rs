use shared::domain::{Availability, ExperienceTier, PersonId, PersonInput};

struct Row {
    id: i64,
    name: &'static str,
    skills: &'static [&'static str],
    experience: ExperienceTier,
    personality: &'static str,
    mbti: &'static str,
    years: u32,
    availability: Availability,
    rate: f64,
}

const POOL: [Row; 8] = [
    Row {
        id: 1,
        name: "Alice Johnson",
        skills: &["JavaScript", "React", "Node.js", "MongoDB"],
        experience: ExperienceTier::Senior,
        personality: "leadership",
        mbti: "ENTJ",
        years: 8,
        availability: Availability::FullTime,
        rate: 85.0,
    },
    Row {
        id: 2,
        name: "Bob Smith",
        skills: &["Python", "Django", "PostgreSQL", "Docker"],
        experience: ExperienceTier::Mid,
        personality: "analytical",
        mbti: "INTJ",
        years: 4,
        availability: Availability::FullTime,
        rate: 65.0,
    },
    Row {
        id: 3,
        name: "Carol Davis",
        skills: &["UI/UX", "React", "CSS", "Figma"],
        experience: ExperienceTier::Mid,
        personality: "creative",
        mbti: "ENFP",
        years: 5,
        availability: Availability::FullTime,
        rate: 70.0,
    },
    Row {
        id: 4,
        name: "David Wilson",
        skills: &["Java", "Spring", "Microservices", "AWS"],
        experience: ExperienceTier::Senior,
        personality: "detail-oriented",
        mbti: "ISTJ",
        years: 7,
        availability: Availability::FullTime,
        rate: 90.0,
    },
    Row {
        id: 5,
        name: "Emma Brown",
        skills: &["Python", "Machine Learning", "TensorFlow", "Data Analysis"],
        experience: ExperienceTier::Senior,
        personality: "analytical",
        mbti: "INTP",
        years: 6,
        availability: Availability::FullTime,
        rate: 95.0,
    },
    Row {
        id: 6,
        name: "Frank Miller",
        skills: &["JavaScript", "Vue.js", "Express", "Redis"],
        experience: ExperienceTier::Junior,
        personality: "collaborative",
        mbti: "ESFJ",
        years: 2,
        availability: Availability::FullTime,
        rate: 45.0,
    },
    Row {
        id: 7,
        name: "Grace Lee",
        skills: &["DevOps", "Kubernetes", "CI/CD", "Terraform"],
        experience: ExperienceTier::Mid,
        personality: "detail-oriented",
        mbti: "ISTP",
        years: 4,
        availability: Availability::Contract,
        rate: 75.0,
    },
    Row {
        id: 8,
        name: "Henry Chen",
        skills: &["Mobile", "React Native", "iOS", "Android"],
        experience: ExperienceTier::Senior,
        personality: "creative",
        mbti: "ENFJ",
        years: 9,
        availability: Availability::PartTime,
        rate: 100.0,
    },
];

/// Built-in candidate pool for `run --sample`.
pub fn personnel() -> Vec<PersonInput> {
    POOL.iter()
        .map(|row| PersonInput {
            id: PersonId(row.id),
            name: row.name.into(),
            skills: row.skills.iter().map(|skill| skill.to_string()).collect(),
            experience: row.experience,
            personality: row.personality.into(),
            mbti_type: Some(row.mbti.into()),
            experience_years: Some(row.years),
            availability: Some(row.availability),
            hourly_rate: Some(row.rate),
        })
        .collect()
}
