use opsgate_domain::EntityKind;
use opsgate_infrastructure::InMemoryDomainGateway;
use serde_json::json;
use tracing::info;

/// Seeds demonstration records into the in-memory domain gateway so the
/// governance pipeline has data to preview and mutate out of the box.
pub async fn seed_demo_records(gateway: &InMemoryDomainGateway) {
    gateway
        .seed_records(
            EntityKind::Student,
            vec![
                json!({"roll_number": "CS-2301", "name": "Asha Nair", "department": "Computer Science", "semester": 5, "section": "A", "cgpa": 7.9, "admission_year": 2023}),
                json!({"roll_number": "CS-2302", "name": "Birk Halvorsen", "department": "Computer Science", "semester": 5, "section": "A", "cgpa": 6.4, "admission_year": 2023}),
                json!({"roll_number": "CS-2303", "name": "Caiwen Lu", "department": "Computer Science", "semester": 5, "section": "B", "cgpa": 8.8, "admission_year": 2023}),
                json!({"roll_number": "MA-2201", "name": "Dara Osei", "department": "Mathematics", "semester": 7, "section": "A", "cgpa": 9.1, "admission_year": 2022}),
            ],
        )
        .await;

    gateway
        .seed_records(
            EntityKind::Course,
            vec![
                json!({"code": "CS101", "name": "Programming Fundamentals", "department": "Computer Science", "semester": 1, "credits": 4}),
                json!({"code": "CS305", "name": "Operating Systems", "department": "Computer Science", "semester": 5, "credits": 4}),
                json!({"code": "MA201", "name": "Linear Algebra", "department": "Mathematics", "semester": 3, "credits": 3}),
            ],
        )
        .await;

    gateway
        .seed_records(
            EntityKind::Department,
            vec![
                json!({"name": "Computer Science", "code": "CS"}),
                json!({"name": "Mathematics", "code": "MA"}),
            ],
        )
        .await;

    gateway
        .seed_records(
            EntityKind::Invoice,
            vec![
                json!({"student_id": 1, "invoice_number": "INV-1001", "amount_due": 1250.0, "status": "open", "description": "Semester 5 tuition"}),
                json!({"student_id": 2, "invoice_number": "INV-1002", "amount_due": 1250.0, "status": "paid", "description": "Semester 5 tuition"}),
            ],
        )
        .await;

    gateway
        .seed_records(
            EntityKind::SalaryRecord,
            vec![
                json!({"employee_id": 11, "month": 7, "year": 2025, "gross_salary": 5400.0, "deductions": 900.0, "net_salary": 4500.0, "status": "paid"}),
            ],
        )
        .await;

    info!("seeded demonstration records into the in-memory domain gateway");
}
