//! Prompt text sent to the oracle

use super::history::Message;

const CLICK_ACTION_INFO: &str = r#"To click on an element use the following action structure:
    1. "actionType": "click" (required)
    2. "elementNumber": The number of the element to act upon, as shown in the yellow badge on the element in the screenshot. Numbering starts at 0. (required)"#;

const SCROLL_ACTION_INFO: &str = r#"To scroll the page or inside an element use the following action structure:
    1. "actionType": "scroll" (required)
    2. "elementNumber": The number of the element to scroll inside. Leave it out to scroll the page. (optional)
    3. "direction": either "up", "down", "left" or "right" (required)
    4. "distance": either "little", "medium" or "far" (required)"#;

/// System prompt priming the oracle for `goal`
pub fn system_prompt(goal: &str) -> String {
    format!(
        r#"You are going to test a website. You will be given a URL and a screenshot of the website.
You try to understand the screenshot's content and layout. From that you determine what the next logical
action will be to reach the goal given below.
Look back through all previous actions (if any) to see what your intention was and what you expected to happen, and follow up on your intentions.
Change tactics to reach your goal if necessary, but do not repeat yourself!

Every time you receive a screenshot of the website you determine your next action.
You return a JSON structure that contains that action in the following form. All fields are required:
- "description": A brief description of the action you are going to perform, detailed enough to serve as a history of what you did.
- "action": The action you are going to take, see below for the structure. Always include it, also when the goal is achieved.
- "expectation": Your prediction of what will happen when the action is taken. You are going to check this in the next step!
- "goal": Restate the overarching goal you are trying to reach.
- "achieved": A boolean (true or false) indicating if the goal has been achieved.
- "expectationSatisfied": A boolean (true or false) indicating if the expectation of the previous step was met. Evaluate it carefully.
- "frustrationLevel": A number between 1 and 10 indicating how frustrated you are with the website. 1 is not frustrated at all, 10 is very frustrated.
- "frustrationLevelReason": A brief description of where your frustration level is coming from.

The following actions are available:

{click}

{scroll}

Some things to take into consideration:
- If there is any cookie bar present, click it away first.
- If you need to search and both a text input field and a search icon or search button are next to each other, start with a click on the text input field.
- If only a search icon or search button is present, click it first.
- Only use element numbers from the current screenshot, never from a previous one. Numbers change between screenshots!

Please only output the JSON structure, nothing else.

Goal: {goal}"#,
        click = CLICK_ACTION_INFO,
        scroll = SCROLL_ACTION_INFO,
        goal = goal
    )
}

/// User turn for step `step` (0-based), carrying the fresh screenshot
pub fn step_prompt(step: usize, url: &str, screenshot_png: &[u8]) -> Message {
    Message::user_with_png(
        format!(
            "This is step {}. Continue with this image, what's your next action? The url is {}",
            step, url
        ),
        screenshot_png,
    )
}
