// Discord commands for behaviour slips, complaints and mentee cards.
//
// Validation and the log line live in the card service. These commands only
// gather names and roles from Discord.

use crate::core::cards::{is_mentee, CardKind};
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum MenteeCard {
    #[name = "Praise"]
    Praise,
    #[name = "Complaint"]
    Complaint,
}

impl From<MenteeCard> for CardKind {
    fn from(card: MenteeCard) -> Self {
        match card {
            MenteeCard::Praise => CardKind::MenteePraise,
            MenteeCard::Complaint => CardKind::MenteeComplaint,
        }
    }
}

async fn sender_name(ctx: Context<'_>) -> String {
    match ctx.author_member().await {
        Some(member) => member.display_name().to_string(),
        None => ctx.author().name.clone(),
    }
}

/// Role names of a member, read from the guild cache.
fn role_names(ctx: Context<'_>, member: &serenity::Member) -> Vec<String> {
    let Some(guild) = ctx.guild() else {
        return Vec::new();
    };
    member
        .roles
        .iter()
        .filter_map(|role_id| guild.roles.get(role_id))
        .map(|role| role.name.clone())
        .collect()
}

/// Issue, log and reply. Validation failures are shown to the author only.
async fn give_card(
    ctx: Context<'_>,
    kind: CardKind,
    target: &str,
    reason: Option<&str>,
    target_is_mentee: bool,
) -> Result<(), Error> {
    let sender = sender_name(ctx).await;
    let today = chrono::Utc::now().date_naive();

    let card = match ctx
        .data()
        .cards
        .issue(kind, &sender, target, reason, target_is_mentee, today)
    {
        Ok(card) => card,
        Err(e) => {
            ctx.send(
                poise::CreateReply::default()
                    .content(format!("❌ {}", e))
                    .ephemeral(true),
            )
            .await?;
            return Ok(());
        }
    };

    ctx.data().cards.post(&card).await;
    ctx.say(card.reply_line()).await?;
    Ok(())
}

/// Record 1 bad-behaviour slip for a name.
#[poise::command(slash_command, guild_only)]
pub async fn bad_slip(
    ctx: Context<'_>,
    #[description = "Who gets the slip"] user: String,
) -> Result<(), Error> {
    ctx.defer().await?;
    give_card(ctx, CardKind::BadSlip, &user, None, false).await
}

/// Record 1 good-behaviour slip for a name.
#[poise::command(slash_command, guild_only)]
pub async fn good_slip(
    ctx: Context<'_>,
    #[description = "Who gets the slip"] user: String,
) -> Result<(), Error> {
    ctx.defer().await?;
    give_card(ctx, CardKind::GoodSlip, &user, None, false).await
}

/// File a complaint against a member, with a reason.
#[poise::command(slash_command, guild_only)]
pub async fn complaint(
    ctx: Context<'_>,
    #[description = "Member the complaint is about"] target: serenity::Member,
    #[description = "Reason for the complaint"] reason: String,
) -> Result<(), Error> {
    ctx.defer().await?;
    let mention = format!("<@{}>", target.user.id);
    give_card(ctx, CardKind::Complaint, &mention, Some(&reason), false).await
}

/// Praise or criticise a mentee (members with a room role).
#[poise::command(slash_command, guild_only)]
pub async fn mentee(
    ctx: Context<'_>,
    #[description = "Praise or complaint"] kind: MenteeCard,
    #[description = "Mentee"] member: serenity::Member,
) -> Result<(), Error> {
    ctx.defer().await?;
    let roles = role_names(ctx, &member);
    let target_is_mentee = is_mentee(roles.iter().map(String::as_str));
    let mention = format!("<@{}>", member.user.id);

    if !target_is_mentee {
        tracing::info!(
            user_id = member.user.id.get(),
            "Mentee card refused, no room role"
        );
    }

    give_card(ctx, kind.into(), &mention, None, target_is_mentee).await
}
