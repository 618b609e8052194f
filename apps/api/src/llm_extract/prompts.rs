// Prompt for LLM-based job extraction.
// Reuses the JSON-only footer from llm_client::prompts.

use crate::llm_client::prompts::JSON_ONLY_FOOTER;

/// Replace: {url}, {page_title}, {content}, {footer}
pub const EXTRACTION_PROMPT_TEMPLATE: &str = r#"Extract job listing information from the following webpage content. For any fields you cannot find, return an empty string "". Return a JSON object with the following structure:
{
  "title": "Job title",
  "company": "Company name",
  "locations": "Location(s) - can be multiple locations separated by commas",
  "jobType": "e.g., 'Full-time', 'Part-time', 'Contract', 'Internship'",
  "workMode": "e.g., 'Remote', 'Hybrid', 'On-site'",
  "experienceLevel": "e.g., 'Entry-level', 'Mid-level', 'Senior', 'Lead', '0-3 years'",
  "educationLevel": "e.g., 'Bachelor's Degree', 'Master's Degree', 'PhD'",
  "duration": "e.g., '6 months', '1 year contract'",
  "salaryAndBenefits": "Capture any mention of salary, stock options, bonuses, and benefits like health insurance, 401k, etc.",
  "visaSponsorship": "e.g., 'Visa sponsorship available', 'Not available', 'Case-by-case'",
  "responsibilities": "A list of job responsibilities, with each item separated by a semicolon ';'.",
  "requiredSkills": "A list of required skills or qualifications, with each item separated by a semicolon ';'.",
  "preferredSkills": "A list of preferred/bonus skills, with each item separated by a semicolon ';'.",
  "description": "A clean, readable, and well-formatted version of the full job description, with proper paragraphs and bullet points."
}

Webpage URL: {url}
Page Title: {page_title}

Content:
{content}

{footer}"#;

pub fn build_extraction_prompt(url: &str, page_title: &str, content: &str) -> String {
    EXTRACTION_PROMPT_TEMPLATE
        .replace("{url}", url)
        .replace("{page_title}", page_title)
        .replace("{footer}", JSON_ONLY_FOOTER)
        // last, so page text containing a placeholder is left alone
        .replace("{content}", content)
}
