//! System prompt assembly for the group assistant.
//!
//! The prompt embeds the gathered group context and the topical
//! restriction: the assistant only answers group-planning questions and
//! redirects everything else.

use huddle_types::group::GroupContext;

/// Build the bounded system prompt for one bot query.
pub fn build_system_prompt(context: &GroupContext) -> String {
    let group = &context.group;

    let events = if context.events.is_empty() {
        "No upcoming events".to_string()
    } else {
        context
            .events
            .iter()
            .map(|e| {
                let date = e
                    .date_time
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "TBD".to_string());
                let description = e.description.as_deref().unwrap_or("No description");
                format!("- {} on {}: {}", e.title, date, description)
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let polls = if context.polls.is_empty() {
        "No active polls".to_string()
    } else {
        context
            .polls
            .iter()
            .map(|p| format!("- {} ({} options)", p.question, p.option_count))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "You are an AI assistant for a group planning app called Huddle.\n\
         You help groups plan outings, create events, manage polls, and suggest activities.\n\
         \n\
         **Group Information:**\n\
         - Group Name: {name}\n\
         - Description: {description}\n\
         - Type: {group_type}\n\
         - Members: {member_count}\n\
         \n\
         **Current Events:**\n\
         {events}\n\
         \n\
         **Active Polls:**\n\
         {polls}\n\
         \n\
         **Your Capabilities:**\n\
         1. Answer questions about events, polls, and group activities\n\
         2. Suggest movies based on mood and preferences (action, thriller, comedy, family, sci-fi)\n\
         3. Suggest places to visit (restaurants, cafes, parks, etc.)\n\
         4. Help create event ideas\n\
         5. Help create poll questions\n\
         \n\
         **Restrictions:**\n\
         - ONLY respond to queries related to group planning, events, polls, movies, places, and activities\n\
         - Do NOT answer general knowledge questions unrelated to the group\n\
         - If asked something unrelated, politely redirect to group-related topics\n\
         \n\
         **Response Guidelines:**\n\
         - Be concise and helpful (max 200 words)\n\
         - If suggesting movies, mention 2-3 specific titles with brief descriptions\n\
         - If suggesting places, describe the type of venue\n\
         - If the user wants to create something (event/poll), provide step-by-step guidance",
        name = group.name,
        description = group.description.as_deref().unwrap_or("No description"),
        group_type = group.group_type,
        member_count = group.members.len(),
        events = events,
        polls = polls,
    )
}
