use shared::{
    domain::{PersonInput, ProjectRequirements},
    error::ValidationError,
    protocol::{OptimizeRequest, PersonBody, RequirementsBody},
};

const DEFAULT_EXPERIENCE_YEARS: u32 = 1;

/// Checks the start preconditions and builds the request body. Pure; runs
/// before any session or network state is touched.
pub fn build_request(
    requirements: &ProjectRequirements,
    personnel: &[PersonInput],
) -> Result<OptimizeRequest, ValidationError> {
    if personnel.is_empty() {
        return Err(ValidationError::EmptyPool);
    }

    let project_name = requirements
        .project_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());
    let team_size = requirements.team_size.filter(|size| *size > 0);
    let (Some(project_name), Some(team_size)) = (project_name, team_size) else {
        return Err(ValidationError::IncompleteRequirements);
    };

    if team_size as usize > personnel.len() {
        return Err(ValidationError::PoolTooSmall {
            team_size,
            pool_size: personnel.len(),
        });
    }

    Ok(OptimizeRequest {
        requirements: RequirementsBody {
            project_name: project_name.to_string(),
            team_size,
            skills: requirements.skills.clone(),
            project_type: requirements.project_type.clone(),
            priority: requirements.priority.clone(),
            timeline: non_blank(requirements.timeline.as_deref()),
            budget: non_blank(requirements.budget.as_deref()),
        },
        personnel: personnel.iter().map(person_body).collect(),
    })
}

fn person_body(person: &PersonInput) -> PersonBody {
    PersonBody {
        id: person.id,
        name: person.name.clone(),
        skills: person.skills.clone(),
        experience: person.experience,
        personality: person.personality.clone(),
        mbti_type: non_blank(person.mbti_type.as_deref()),
        experience_years: person
            .experience_years
            .filter(|years| *years > 0)
            .unwrap_or(DEFAULT_EXPERIENCE_YEARS),
        availability: person.availability.unwrap_or_default(),
        hourly_rate: person.hourly_rate.unwrap_or(0.0),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
