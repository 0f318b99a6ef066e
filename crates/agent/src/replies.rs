//! Localized reply templates. Every reply the agent emits comes through
//! here so both languages stay in step.

use chrono::{DateTime, Utc};

use ticketry_core::{
    Language, MissingField, OrderDraft, RelativeBuckets, TicketType, TimeSlot,
};

fn format_time(at: DateTime<Utc>) -> String {
    at.format("%d/%m %H:%M").to_string()
}

pub fn clarification(language: Language) -> String {
    match language {
        Language::Vi => {
            "Xin lỗi, tôi chưa hiểu ý bạn. Bạn có thể nói rõ hơn về sự kiện hoặc vé bạn cần không?"
                .to_string()
        }
        Language::En => {
            "Sorry, I did not quite get that. Could you tell me more about the event or ticket you need?"
                .to_string()
        }
    }
}

pub fn apology(language: Language) -> String {
    match language {
        Language::Vi => {
            "Xin lỗi, hệ thống đang gặp trục trặc. Bạn vui lòng thử lại sau ít phút nhé."
                .to_string()
        }
        Language::En => {
            "Sorry, something went wrong on our side. Please try again in a moment.".to_string()
        }
    }
}

pub fn restart_ack(language: Language) -> String {
    match language {
        Language::Vi => {
            "Đã làm lại từ đầu. Bạn muốn đặt vé cho sự kiện nào?".to_string()
        }
        Language::En => {
            "Starting over. Which event would you like to book tickets for?".to_string()
        }
    }
}

pub fn abandon_ack(language: Language) -> String {
    match language {
        Language::Vi => {
            "Đã hủy yêu cầu đặt vé. Khi nào cần, bạn cứ nhắn cho tôi nhé.".to_string()
        }
        Language::En => {
            "Your booking request has been cancelled. Message me whenever you need tickets."
                .to_string()
        }
    }
}

pub fn event_prompt(language: Language) -> String {
    match language {
        Language::Vi => "Bạn muốn đặt vé cho sự kiện nào?".to_string(),
        Language::En => "Which event would you like to book tickets for?".to_string(),
    }
}

pub fn event_not_found(language: Language) -> String {
    match language {
        Language::Vi => {
            "Tôi không tìm thấy sự kiện phù hợp. Bạn có thể cho tôi tên sự kiện chính xác hơn không?"
                .to_string()
        }
        Language::En => {
            "I could not find a matching event. Could you give me a more exact event name?"
                .to_string()
        }
    }
}

pub fn ticket_type_prompt(
    language: Language,
    event_title: &str,
    ticket_types: &[TicketType],
) -> String {
    let mut lines = match language {
        Language::Vi => vec![format!("Sự kiện \"{event_title}\" có các loại vé sau:")],
        Language::En => vec![format!("\"{event_title}\" has these ticket types:")],
    };
    for (position, ticket_type) in ticket_types.iter().enumerate() {
        lines.push(format!("{}. {} - {}", position + 1, ticket_type.name, ticket_type.price));
    }
    lines.push(match language {
        Language::Vi => "Bạn chọn loại vé nào?".to_string(),
        Language::En => "Which ticket type would you like?".to_string(),
    });
    lines.join("\n")
}

pub fn no_ticket_types(language: Language, event_title: &str) -> String {
    match language {
        Language::Vi => format!(
            "Sự kiện \"{event_title}\" hiện chưa mở bán vé. Bạn muốn chọn sự kiện khác không?"
        ),
        Language::En => format!(
            "\"{event_title}\" has no tickets on sale yet. Would you like a different event?"
        ),
    }
}

pub fn ticket_type_not_recognized(language: Language, ticket_types: &[TicketType]) -> String {
    let names: Vec<&str> =
        ticket_types.iter().map(|ticket_type| ticket_type.name.as_str()).collect();
    let listed = names.join(", ");
    match language {
        Language::Vi => {
            format!("Tôi chưa nhận ra loại vé đó. Các loại hiện có: {listed}. Bạn chọn loại nào?")
        }
        Language::En => {
            format!("I did not recognize that ticket type. Available: {listed}. Which one?")
        }
    }
}

fn field_label(language: Language, field: MissingField) -> &'static str {
    match (language, field) {
        (Language::Vi, MissingField::Event) => "sự kiện",
        (Language::Vi, MissingField::TicketType) => "loại vé",
        (Language::Vi, MissingField::ParticipantName) => "họ tên",
        (Language::Vi, MissingField::ParticipantEmail) => "email hợp lệ",
        (Language::En, MissingField::Event) => "an event",
        (Language::En, MissingField::TicketType) => "a ticket type",
        (Language::En, MissingField::ParticipantName) => "your full name",
        (Language::En, MissingField::ParticipantEmail) => "a valid email",
    }
}

pub fn contact_prompt(language: Language, missing: &[MissingField]) -> String {
    let labels: Vec<&str> = missing.iter().map(|field| field_label(language, *field)).collect();
    let listed = labels.join(", ");
    match language {
        Language::Vi => {
            format!("Để hoàn tất đơn, tôi cần thêm: {listed}. Bạn vui lòng cung cấp giúp nhé.")
        }
        Language::En => format!("To complete the order I still need: {listed}."),
    }
}

pub fn confirmation_prompt(language: Language, draft: &OrderDraft) -> String {
    let event = draft.event.as_ref().map(|event| event.title.as_str()).unwrap_or("-");
    let ticket_type =
        draft.ticket_type.as_ref().map(|ticket_type| ticket_type.name.as_str()).unwrap_or("-");
    let name = draft.participant_name.as_deref().unwrap_or("-");
    let email = draft.participant_email.as_deref().unwrap_or("-");

    match language {
        Language::Vi => format!(
            "Xin xác nhận đơn đặt vé:\n- Sự kiện: {event}\n- Loại vé: {ticket_type}\n- Họ tên: {name}\n- Email: {email}\nBạn trả lời \"xác nhận\" để hoàn tất hoặc \"làm lại\" để bắt đầu lại."
        ),
        Language::En => format!(
            "Please confirm your order:\n- Event: {event}\n- Ticket type: {ticket_type}\n- Name: {name}\n- Email: {email}\nReply \"confirm\" to finish or \"restart\" to start over."
        ),
    }
}

pub fn confirm_hint(language: Language) -> String {
    match language {
        Language::Vi => {
            "Đơn của bạn đang chờ xác nhận. Trả lời \"xác nhận\" để hoàn tất hoặc \"làm lại\" để bắt đầu lại."
                .to_string()
        }
        Language::En => {
            "Your order is waiting for confirmation. Reply \"confirm\" to finish or \"restart\" to start over."
                .to_string()
        }
    }
}

pub fn order_submitted(language: Language, order_id: &str) -> String {
    match language {
        Language::Vi => format!(
            "Đặt vé thành công! Mã đơn của bạn là {order_id}. Cảm ơn bạn, hẹn gặp tại sự kiện!"
        ),
        Language::En => {
            format!("Your booking is confirmed! Order reference: {order_id}. See you at the event!")
        }
    }
}

pub fn inventory_exhausted(language: Language, ticket_type_name: &str) -> String {
    match language {
        Language::Vi => format!(
            "Rất tiếc, loại vé \"{ticket_type_name}\" vừa hết. Bạn muốn chọn loại vé khác không?"
        ),
        Language::En => format!(
            "Unfortunately \"{ticket_type_name}\" just sold out. Would you like a different ticket type?"
        ),
    }
}

pub fn email_unsupported(language: Language) -> String {
    match language {
        Language::Vi => {
            "Tôi chưa thể gửi email giúp bạn. Tôi có thể hỗ trợ tìm sự kiện và đặt vé nhé."
                .to_string()
        }
        Language::En => {
            "I cannot send emails yet. I can help you find events and book tickets.".to_string()
        }
    }
}

pub fn free_time_reply(language: Language, slots: &[TimeSlot]) -> String {
    if slots.is_empty() {
        return match language {
            Language::Vi => "Lịch của bạn trong 7 ngày tới đã kín.".to_string(),
            Language::En => "Your next 7 days are fully booked.".to_string(),
        };
    }

    let mut lines = match language {
        Language::Vi => vec!["Các khung giờ rảnh gần nhất:".to_string()],
        Language::En => vec!["Your next free slots:".to_string()],
    };
    let joiner = match language {
        Language::Vi => "đến",
        Language::En => "to",
    };
    for slot in slots.iter().take(5) {
        lines.push(format!("- {} {joiner} {}", format_time(slot.start), format_time(slot.end)));
    }
    lines.join("\n")
}

pub fn summary_reply(language: Language, buckets: &RelativeBuckets) -> String {
    let sections: [(&str, &str, &Vec<_>); 4] = [
        ("Hôm nay", "Today", &buckets.today),
        ("Ngày mai", "Tomorrow", &buckets.tomorrow),
        ("Tuần này", "This week", &buckets.this_week),
        ("Tuần sau", "Next week", &buckets.next_week),
    ];

    let mut lines = match language {
        Language::Vi => vec!["Tổng quan sự kiện:".to_string()],
        Language::En => vec!["Event overview:".to_string()],
    };
    let mut any = false;
    for (vi_label, en_label, events) in sections {
        if events.is_empty() {
            continue;
        }
        any = true;
        let label = match language {
            Language::Vi => vi_label,
            Language::En => en_label,
        };
        let titles: Vec<String> = events
            .iter()
            .map(|event| format!("{} ({})", event.title, format_time(event.starts_at)))
            .collect();
        lines.push(format!("- {label}: {}", titles.join(", ")));
    }

    if !any {
        return match language {
            Language::Vi => "Hiện chưa có sự kiện nào trong hai tuần tới.".to_string(),
            Language::En => "There are no events in the next two weeks.".to_string(),
        };
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use ticketry_core::{Language, MissingField};

    use super::{confirmation_prompt, contact_prompt};

    #[test]
    fn contact_prompt_lists_missing_fields_in_order() {
        let prompt = contact_prompt(
            Language::En,
            &[MissingField::ParticipantName, MissingField::ParticipantEmail],
        );
        let name_at = prompt.find("your full name").expect("name listed");
        let email_at = prompt.find("a valid email").expect("email listed");
        assert!(name_at < email_at);
    }

    #[test]
    fn confirmation_prompt_summarizes_the_draft() {
        let mut draft = ticketry_core::OrderDraft::new();
        draft.participant_name = Some("Nguyen Van An".to_string());
        let prompt = confirmation_prompt(Language::Vi, &draft);
        assert!(prompt.contains("Nguyen Van An"));
        assert!(prompt.contains("xác nhận"));
    }
}
