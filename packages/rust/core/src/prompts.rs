//! Prompt chain: three fixed templates, each fed by the previous stage.
//!
//! Pure string interpolation, no I/O.

/// What the seller offers; the opportunity analysis is tailored to it.
pub const SELLER_PROFILE: &str = "custom HR training and modules";

/// Word whose occurrences on the homepage the summary must count.
pub const TRACKED_KEYWORD: &str = "AI";

/// Stage 1: homepage text → ~200 word structured company summary.
pub fn render_summary_prompt(homepage_text: &str) -> String {
    format!(
        "Below is the raw homepage information of my target company.\n\
         \n\
         Convert it into a 200 word summary organized in the following manner:\n\
         \n\
         - Company overview\n\
         - Product and service offering recap\n\
         - Potential target industries for this company\n\
         - Their core USP\n\
         - How many times the word \"{TRACKED_KEYWORD}\" is used on their homepage\n\
         \n\
         Here's the homepage information:\n\
         {homepage_text}\n"
    )
}

/// Stage 2: summary → ~150 word bulleted sales-opportunity analysis.
pub fn render_opportunity_prompt(summary_text: &str) -> String {
    format!(
        "I will give you the company overview of a target company I'm trying to pitch to.\n\
         \n\
         Read through their offering and create a potential sales opportunity for me.\n\
         \n\
         My company offers {SELLER_PROFILE}.\n\
         \n\
         Your sales opportunity analysis should be 150 words.\n\
         It should have multiple bullet points and tell me how I can position my solution.\n\
         Make it highly custom built and use the target company's industry terminology.\n\
         \n\
         Here's the summary:\n\
         {summary_text}\n"
    )
}

/// Stage 3: summary + opportunity analysis → ~100 word outreach email.
pub fn render_email_prompt(summary_text: &str, opportunity_text: &str) -> String {
    format!(
        "Write a custom 100 word sales email for a company I'm targeting.\n\
         \n\
         The email has to reference what the company offers from ###Company overview###\n\
         and should include potential sales hooks from ###Sales opportunity analysis###.\n\
         \n\
         Keep the text extremely human and to the point.\n\
         \n\
         ###Company overview###\n\
         {summary_text}\n\
         \n\
         ###Sales opportunity analysis###\n\
         {opportunity_text}\n"
    )
}
