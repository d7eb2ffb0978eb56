//! Prompt templates sent to the oracle.
//!
//! Placeholders are filled by [`crate::llm::template::substitute`].

/// Email classification prompt. Placeholders: `SUBJECT`, `SENDER`, `TEXT`.
pub const EMAIL_CLASSIFICATION: &str = r#"You analyze emails received by a job seeker. Decide whether the email below reports a change in the status of one of their job applications, or whether it is something else. When it is an application update, also extract the details of that application.

Work through the email like this:

1. Read the subject, the sender and the body.
2. Look for evidence that the email is an application update:
   - it confirms an application, schedules or mentions an interview, asks the candidate to complete an assessment or other task, declines the candidate, or extends an offer;
   - it comes from a recruiter, a hiring manager, an HR team or an applicant tracking system acting for a company.
3. Look for evidence that it is something else:
   - job alerts, recommended postings or newsletters from job boards;
   - marketing, social network notifications, or anything not tied to a specific application the candidate made.
4. Choose exactly one category: "JobApplicationUpdate" or "OtherEmail".

For a JobApplicationUpdate, pick the application status from this list:
   - applied: the company confirms it received the application.
   - interview: an interview is scheduled, proposed, or the candidate is asked to book one.
   - actions: the candidate must complete something asynchronously (assessment, questionnaire, take-home task).
   - rejected: the application will not move forward.
   - offer: the company extends an offer.

Write "N/A" for any field the email does not reveal.

Reply with the tags below and nothing else.

<category>JobApplicationUpdate or OtherEmail</category>

Only when the category is JobApplicationUpdate, add:

<application_status>applied, interview, actions, rejected or offer</application_status>
<job_id>requisition or job id</job_id>
<applicant_name>candidate name</applicant_name>
<applicant_phone>candidate phone number</applicant_phone>
<applicant_email>candidate email address</applicant_email>
<company_name>hiring company</company_name>
<role>job title</role>
<location>job location</location>
<is_internship>true or false</is_internship>

The email:

<email_subject>
{{SUBJECT}}
</email_subject>

<email_sender>
{{SENDER}}
</email_sender>

<email_body>
{{TEXT}}
</email_body>"#;

/// Job title ranking prompt. Placeholders: `JOB_TITLES_LIST`, `TARGET_JOB_TITLE`.
pub const JOB_TITLE_SIMILARITY: &str = r#"You compare job titles. Given a list of job titles and a target job title, keep only the titles that describe essentially the same job as the target and rank them from most to least similar.

Job titles:
<job_titles_list>
{{JOB_TITLES_LIST}}
</job_titles_list>

Target job title:
<target_job_title>
{{TARGET_JOB_TITLE}}
</target_job_title>

How to decide:

1. Identify what the target job is: its function, core skills, domain and seniority.
2. For each title in the list, decide whether it is closely related to the target on those points.
3. Be strict. Titles from different functions (for example data analyst and software engineer) are unrelated unless their day-to-day work clearly overlaps.
4. Drop every unrelated title.
5. Order the remaining titles from most to least similar.

Reply with the related titles exactly as written in the list, separated by commas, inside the tag below, and nothing else:

<ranked_list>
Title A, Title B, Title C
</ranked_list>"#;
